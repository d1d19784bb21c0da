//! Snapshot of the process environment consumed by the pipeline.

use std::path::{Path, PathBuf};

/// Read-only view of the environment inputs the pipeline consumes.
///
/// Captured once at startup and handed to every component that needs it, so
/// tasks never read ambient process state mid-run. Tests construct synthetic
/// views instead of mutating the real environment.
#[derive(Debug, Clone)]
pub struct EnvironmentView {
    home: PathBuf,
    ci_env_file: Option<PathBuf>,
}

impl EnvironmentView {
    /// Captures the real process environment.
    ///
    /// The home directory feeds the `user` token only, never security
    /// decisions. `GITHUB_ENV`, when set, names the CI environment file that
    /// resolved name tokens are appended to.
    pub fn capture() -> Self {
        Self {
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            ci_env_file: std::env::var_os("GITHUB_ENV").map(PathBuf::from),
        }
    }

    /// Creates a synthetic view (used by tests and embedders).
    pub fn new(home: impl Into<PathBuf>, ci_env_file: Option<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ci_env_file,
        }
    }

    /// Returns the invoking user's home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Returns the CI environment file path, if one is configured.
    pub fn ci_env_file(&self) -> Option<&Path> {
        self.ci_env_file.as_deref()
    }
}
