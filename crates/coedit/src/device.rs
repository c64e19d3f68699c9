//! Identity of this CLI process as an editing device.

use chrono::Utc;
use coedit_core::DeviceFingerprint;

/// Fingerprint for this process: host name, pid and start time.
///
/// Two `coedit open` runs on one host count as two devices, the same way
/// two browser tabs do.
pub fn process_fingerprint() -> DeviceFingerprint {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let pid = std::process::id().to_string();
    let started = Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string();
    DeviceFingerprint::derive([host, pid, started])
}

/// Use `explicit` if given, otherwise [`process_fingerprint`].
pub fn resolve(explicit: Option<&str>) -> coedit_core::Result<DeviceFingerprint> {
    explicit.map_or_else(|| Ok(process_fingerprint()), DeviceFingerprint::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_fingerprint_shape() {
        let fp = process_fingerprint();
        assert!(fp.as_str().starts_with("dev-"));
    }

    #[test]
    fn test_explicit_fingerprint_wins() {
        let fp = resolve(Some("laptop")).unwrap();
        assert_eq!(fp.as_str(), "laptop");
    }

    #[test]
    fn test_explicit_fingerprint_validated() {
        assert!(resolve(Some("   ")).is_err());
    }
}
