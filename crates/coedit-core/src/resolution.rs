//! Conflict resolution contract
//!
//! When a save is attempted while other devices hold active sessions, the
//! caller is shown a [`ConflictPrompt`] and must pick one of two terminal
//! actions. There is no merge: "save anyway" overwrites whatever the other
//! devices wrote (last writer wins), "cancel" leaves the record alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::conflict::{ConflictInfo, OtherDevice};

/// Maximum characters kept when a user agent cannot be recognized.
const MAX_AGENT_LABEL: usize = 40;

/// Terminal action chosen at save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SaveDecision {
    /// Write anyway, overwriting concurrent edits
    SaveAnyway,
    /// Abort the save
    Cancel,
}

/// One line of the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Relative time since the device's last heartbeat
    pub last_active: String,
    /// Abbreviated user agent
    pub agent: String,
}

impl From<(&OtherDevice, DateTime<Utc>)> for DeviceSummary {
    fn from((device, now): (&OtherDevice, DateTime<Utc>)) -> Self {
        Self {
            last_active: relative_time(device.last_heartbeat, now),
            agent: abbreviate_user_agent(&device.user_agent),
        }
    }
}

/// What the user is shown before deciding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPrompt {
    /// Other active devices, most recent first
    pub devices: Vec<DeviceSummary>,
}

impl ConflictPrompt {
    /// Build the prompt for a conflict snapshot at `now`.
    #[must_use]
    pub fn from_info(info: &ConflictInfo, now: DateTime<Utc>) -> Self {
        Self {
            devices: info
                .other_devices
                .iter()
                .map(|d| DeviceSummary::from((d, now)))
                .collect(),
        }
    }

    /// Plain-text rendering for terminals and logs.
    #[must_use]
    pub fn render(&self) -> String {
        let header = match self.devices.len() {
            1 => "This record is being edited on another device:".to_string(),
            n => format!("This record is being edited on {n} other devices:"),
        };
        let lines = self
            .devices
            .iter()
            .map(|d| format!("  - {} (last active {})", d.agent, d.last_active));

        std::iter::once(header)
            .chain(lines)
            .chain(std::iter::once(
                "Saving now will overwrite their changes.".to_string(),
            ))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decides between [`SaveDecision::SaveAnyway`] and [`SaveDecision::Cancel`].
pub trait ConflictResolver: Send + Sync {
    /// Pick an action for the given prompt.
    fn decide(&self, prompt: &ConflictPrompt) -> SaveDecision;
}

/// A fixed decision, for non-interactive callers.
impl ConflictResolver for SaveDecision {
    fn decide(&self, _prompt: &ConflictPrompt) -> SaveDecision {
        *self
    }
}

/// Human-friendly age of `then` relative to `now`.
#[must_use]
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - then;
    let minutes = age.num_minutes();
    let hours = age.num_hours();

    if age.num_seconds() < 60 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if hours < 24 {
        format!("{hours} h ago")
    } else {
        then.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

/// Short label for a user agent, e.g. `Chrome on Windows`.
///
/// Unrecognized agents are truncated to 40 characters.
#[must_use]
pub fn abbreviate_user_agent(user_agent: &str) -> String {
    let ua = user_agent.trim();
    if ua.is_empty() {
        return "Unknown device".to_string();
    }

    match (browser_family(ua), os_family(ua)) {
        (Some(browser), Some(os)) => format!("{browser} on {os}"),
        (Some(browser), None) => browser.to_string(),
        (None, Some(os)) => os.to_string(),
        (None, None) => truncate(ua, MAX_AGENT_LABEL),
    }
}

fn browser_family(ua: &str) -> Option<&'static str> {
    // Order matters: Edge and Opera also carry "Chrome/", Chrome carries "Safari/".
    const FAMILIES: &[(&str, &str)] = &[
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Firefox/", "Firefox"),
        ("FxiOS/", "Firefox"),
        ("CriOS/", "Chrome"),
        ("Chrome/", "Chrome"),
        ("Safari/", "Safari"),
    ];
    FAMILIES
        .iter()
        .find(|(token, _)| ua.contains(token))
        .map(|(_, name)| *name)
}

fn os_family(ua: &str) -> Option<&'static str> {
    // iOS agents say "like Mac OS X"; Android and ChromeOS say "Linux".
    const FAMILIES: &[(&str, &str)] = &[
        ("iPhone", "iOS"),
        ("iPad", "iOS"),
        ("Android", "Android"),
        ("CrOS", "ChromeOS"),
        ("Windows", "Windows"),
        ("Mac OS X", "macOS"),
        ("Macintosh", "macOS"),
        ("Linux", "Linux"),
    ];
    FAMILIES
        .iter()
        .find(|(token, _)| ua.contains(token))
        .map(|(_, name)| *name)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::session::{DeviceFingerprint, SessionId};

    const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) \
                                 AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 \
                                 Mobile/15E148 Safari/604.1";
    const EDGE_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                            (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";

    #[test]
    fn test_abbreviate_known_agents() {
        assert_eq!(abbreviate_user_agent(CHROME_WIN), "Chrome on Windows");
        assert_eq!(abbreviate_user_agent(SAFARI_IPHONE), "Safari on iOS");
        assert_eq!(abbreviate_user_agent(EDGE_MAC), "Edge on macOS");
    }

    #[test]
    fn test_abbreviate_unknown_agent_truncates() {
        let ua = "custom-sync-client/9.9 build 2024-11-02 nightly channel extra";
        let label = abbreviate_user_agent(ua);
        assert_eq!(label.chars().count(), MAX_AGENT_LABEL);
        assert!(label.ends_with('…'));
    }

    #[test]
    fn test_abbreviate_short_unknown_agent_kept() {
        assert_eq!(abbreviate_user_agent("coedit/0.1.0"), "coedit/0.1.0");
    }

    #[test]
    fn test_abbreviate_empty_agent() {
        assert_eq!(abbreviate_user_agent("  "), "Unknown device");
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(now - Duration::seconds(5), now), "just now");
        assert_eq!(relative_time(now + Duration::seconds(5), now), "just now");
        assert_eq!(relative_time(now - Duration::seconds(150), now), "2 min ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3 h ago");
    }

    #[test]
    fn test_prompt_lists_devices() {
        let now = Utc::now();
        let info = ConflictInfo::from_devices(vec![OtherDevice {
            id: SessionId::generate(),
            device_fingerprint: DeviceFingerprint::parse("b").unwrap(),
            last_heartbeat: now - Duration::seconds(120),
            user_agent: CHROME_WIN.to_string(),
        }]);

        let prompt = ConflictPrompt::from_info(&info, now);
        assert_eq!(prompt.devices.len(), 1);
        let text = prompt.render();
        assert!(text.contains("another device"));
        assert!(text.contains("Chrome on Windows (last active 2 min ago)"));
    }

    #[test]
    fn test_fixed_decision_resolver() {
        let prompt = ConflictPrompt { devices: vec![] };
        assert_eq!(SaveDecision::Cancel.decide(&prompt), SaveDecision::Cancel);
        assert_eq!(
            SaveDecision::SaveAnyway.decide(&prompt),
            SaveDecision::SaveAnyway
        );
    }

    #[test]
    fn test_decision_parses_kebab_case() {
        assert_eq!(
            "save-anyway".parse::<SaveDecision>().unwrap(),
            SaveDecision::SaveAnyway
        );
    }
}
