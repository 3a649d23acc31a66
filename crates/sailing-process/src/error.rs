//! Error types for process execution.

use thiserror::Error;

/// Errors that can occur while launching or reading an external process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("'{program}' exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        /// Program that failed.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The program was cancelled before it finished.
    #[error("'{program}' was cancelled before completion")]
    Cancelled {
        /// Program that was cancelled.
        program: String,
    },

    /// I/O error while reading output or waiting for exit.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Result type alias for process operations.
pub type Result<T> = std::result::Result<T, ProcessError>;
