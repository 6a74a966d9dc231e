use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by reset script generation and execution.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Core(#[from] resetgen_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Both the ordered and the constraints-disabled scripts failed.
    #[error(
        "reset script failed self-test with both strategies (kept at {}): ordered: {primary}; constraints_disabled: {fallback}",
        failed_path.display()
    )]
    Fatal {
        failed_path: PathBuf,
        primary: String,
        fallback: String,
    },
    /// A persisted script failed when executed.
    #[error("reset script execution failed: {0}")]
    Execution(String),
    /// A persisted script did not finish in time and was cancelled.
    #[error("reset script timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

pub type GenerateResult<T> = std::result::Result<T, GenerateError>;
