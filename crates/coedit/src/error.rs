//! CLI-level errors and exit codes.
//!
//! Exit codes from `coedit_core::Error` pass through unchanged; the CLI
//! adds 6 for a save cancelled because of a conflict.

use thiserror::Error;

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Save cancelled: {devices} other device(s) editing {record_id}; use --force to overwrite")]
    SaveCancelled { record_id: String, devices: usize },
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::SaveCancelled { .. } => 6,
        }
    }
}

/// Format an error for user display (no stack traces)
pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    if let Some(source) = err.source() {
        let source_msg = source.to_string();
        if !msg.contains(&source_msg) && !source_msg.is_empty() {
            return format!("{msg}\nCause: {source_msg}");
        }
    }
    msg
}

/// Semantic exit code for an error; 1 when the error is not one of ours.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<coedit_core::Error>()
        .map(coedit_core::Error::exit_code)
        .or_else(|| err.downcast_ref::<CliError>().map(CliError::exit_code))
        .unwrap_or(1)
}
