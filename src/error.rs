//! Top-level error types for the distpack binary.

use thiserror::Error;

/// Result type alias for top-level operations
pub type Result<T> = std::result::Result<T, DistpackError>;

/// Main error type for the distpack binary
#[derive(Error, Debug)]
pub enum DistpackError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline errors
    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}
