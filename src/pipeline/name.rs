//! Product name resolution and persistence.
//!
//! Naming feeds file paths and archive identifiers that must be stable
//! across machines, so the derived variants use locale-independent case
//! folding. The resolved triple is persisted to a small properties file so
//! that later, separately-invoked stages of the same build see identical
//! values instead of re-deriving from a possibly changed environment.

use crate::pipeline::env::EnvironmentView;
use crate::pipeline::error::Result;
use crate::pipeline::utils;
use std::path::{Path, PathBuf};

/// Built-in display name used when no name is configured.
pub const DEFAULT_DISPLAY_NAME: &str = "Launcher";

/// Resolved canonical product names for one pipeline run.
///
/// Immutable once resolved; every templating task and the archive bundler
/// read the same triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductName {
    display: String,
    normalized: String,
    upper: String,
}

impl ProductName {
    /// Derives the normalized and uppercase variants from a display name.
    pub fn derive(display: &str) -> Self {
        Self {
            display: display.to_string(),
            normalized: filesystem_safe_lower(display),
            upper: display.to_uppercase(),
        }
    }

    /// Like [`ProductName::derive`], but with an explicit normalized name.
    ///
    /// Mirrors the `lower` override property: when the caller supplies a
    /// normalized name it is taken verbatim instead of derived.
    pub fn with_normalized(display: &str, normalized: &str) -> Self {
        Self {
            display: display.to_string(),
            normalized: normalized.to_string(),
            upper: display.to_uppercase(),
        }
    }

    /// Returns the human-readable display name.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Returns the lowercase, filesystem-safe name.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Returns the uppercase variant.
    pub fn upper(&self) -> &str {
        &self.upper
    }
}

/// Lowercases a display name and maps characters unsafe in file paths to `-`.
fn filesystem_safe_lower(display: &str) -> String {
    display
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '-',
        })
        .collect()
}

/// Resolves the product name triple for one run.
///
/// Resolution never fails: a missing configured name falls back to the
/// default, and an unreadable state file falls back to derivation. The
/// persisted state file, when present, wins over configured values so that
/// every task in one overall build agrees on the triple.
#[derive(Debug, Clone)]
pub struct NameResolver {
    state_file: PathBuf,
    default_display: String,
}

impl NameResolver {
    /// Creates a resolver persisting to `state_file`.
    pub fn new(state_file: impl Into<PathBuf>, default_display: impl Into<String>) -> Self {
        Self {
            state_file: state_file.into(),
            default_display: default_display.into(),
        }
    }

    /// Resolves the product name triple.
    ///
    /// Precedence: persisted state file, then `configured`, then the
    /// built-in default. An explicit `lower` override replaces the derived
    /// normalized name.
    pub fn resolve(&self, configured: Option<&str>, lower: Option<&str>) -> ProductName {
        if let Some(persisted) = self.load_state() {
            return persisted;
        }

        let display = configured
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_display);

        match lower.filter(|name| !name.is_empty()) {
            Some(lower) => ProductName::with_normalized(display, lower),
            None => ProductName::derive(display),
        }
    }

    /// Persists the resolved triple to the properties state file.
    pub async fn persist(&self, product: &ProductName) -> Result<()> {
        let contents = format!(
            "finalName={}\nlowerName={}\nupperName={}\n",
            product.display(),
            product.normalized(),
            product.upper()
        );
        utils::fs::atomic_write(&self.state_file, contents.into_bytes()).await
    }

    /// Appends the resolved names to the CI environment file, if configured.
    ///
    /// Later, separately-invoked pipeline stages consume these as
    /// `KEY=value` lines.
    pub async fn export_ci_env(&self, product: &ProductName, env: &EnvironmentView) -> Result<()> {
        let Some(ci_env_file) = env.ci_env_file() else {
            return Ok(());
        };

        let lines = format!(
            "APP_NAME={}\nAPP_NAME_LOWER={}\nAPP_NAME_UPPER={}\n",
            product.display(),
            product.normalized(),
            product.upper()
        );
        utils::fs::append(ci_env_file, lines.as_bytes()).await?;
        log::debug!("Exported app names to {}", ci_env_file.display());
        Ok(())
    }

    /// Returns the state file path.
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Loads a previously persisted triple, if one exists and is readable.
    fn load_state(&self) -> Option<ProductName> {
        let contents = std::fs::read_to_string(&self.state_file).ok()?;

        let mut display = None;
        let mut lower = None;
        for line in contents.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "finalName" => display = Some(value.trim().to_string()),
                "lowerName" => lower = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let display = display?;
        let product = match lower {
            Some(lower) => ProductName::with_normalized(&display, &lower),
            None => ProductName::derive(&display),
        };
        log::debug!(
            "Loaded persisted product name from {}",
            self.state_file.display()
        );
        Some(product)
    }
}
