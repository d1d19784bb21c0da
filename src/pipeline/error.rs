//! Error types for pipeline operations.
//!
//! The variants follow the pipeline's failure taxonomy: configuration
//! problems abort a run before any task starts, while resource, write and
//! reachability errors stay local to the task that hit them and cascade to
//! dependents as skips.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid pipeline configuration (duplicate task ids, cycles, bad shapes)
    #[error("configuration error: {0}")]
    Config(String),

    /// A declared template source (or include pattern) matched nothing
    #[error("missing resource: {}", .path.display())]
    MissingResource {
        /// Source path or pattern that could not be found
        path: PathBuf,
    },

    /// An output file could not be written or published
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Destination that failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Archive minimization failed (unknown entry point, undeclared
    /// reference, or an empty post-minimization entry set)
    #[error("reachability error: {0}")]
    Reachability(String),

    /// IO error attributed to a filesystem operation on a path
    #[error("{context} {}: {source}", .path.display())]
    Fs {
        /// What was being attempted
        context: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive container errors
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid keep-list or include pattern
    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Generic errors
    #[error("{0}")]
    GenericError(String),
}

/// Attach a message to `Option`/`Result` values, producing a pipeline error.
pub trait Context<T> {
    /// Convert to `Result`, wrapping failures with the given message.
    fn context<C: Into<String>>(self, msg: C) -> Result<T>;
}

impl<T> Context<T> for Option<T> {
    fn context<C: Into<String>>(self, msg: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(msg.into()))
    }
}

impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
    fn context<C: Into<String>>(self, msg: C) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{}: {}", msg.into(), e)))
    }
}

/// Attach filesystem context (operation + path) to IO results.
pub trait ErrorExt<T> {
    /// Convert an IO result into a pipeline result carrying the operation
    /// description and the path it targeted.
    fn fs_context(self, context: &'static str, path: &Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context,
            path: path.to_path_buf(),
            source,
        })
    }
}
