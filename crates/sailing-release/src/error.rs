//! Error types for the release crate.

use thiserror::Error;

/// Errors that can occur while managing a release.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The forwarding tool reported success but the line carried no port.
    #[error("malformed forwarding line, no local port found: {0}")]
    MalformedForwardingLine(String),

    /// A tunnel was requested with an unusable target.
    #[error("invalid tunnel target: {0}")]
    InvalidTarget(String),

    /// An external command failed.
    #[error("process error: {0}")]
    Process(#[from] sailing_process::ProcessError),
}

/// Result type for release operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;
