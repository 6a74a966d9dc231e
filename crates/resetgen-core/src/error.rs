use thiserror::Error;

/// Core error type shared across resetgen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be reached at all.
    #[error("connectivity error: {0}")]
    Connectivity(String),
    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem failure while reading or writing artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results returned by resetgen crates.
pub type Result<T> = std::result::Result<T, Error>;
