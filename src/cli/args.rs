//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

/// Deterministic multi-target packaging pipeline
#[derive(Parser, Debug)]
#[command(
    name = "distpack",
    version,
    about = "Deterministic multi-target packaging pipeline",
    long_about = "Produces platform distributables from one resolved product name: a minimized,
reproducible executable archive plus filtered AppImage, Inno Setup, packr and
macOS installer descriptors, all written under the staging directory.

Usage:
  distpack --name ExampleApp
  distpack --config release.toml --output dist

Exit code 0 = every pipeline task succeeded."
)]
pub struct Args {
    /// Product display name override
    ///
    /// Falls back to the configured name, then the built-in default. A
    /// previously persisted name state file in the staging area wins over
    /// both, so separately-invoked stages of one build agree.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Normalized (lowercase) name override
    #[arg(long, value_name = "NAME")]
    pub lower: Option<String>,

    /// Pipeline configuration file
    ///
    /// Defaults to `distpack.toml` in the working directory; the default is
    /// optional, an explicitly given file must exist.
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Staging directory override
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err("Product name cannot be empty".to_string());
        }

        if let Some(lower) = &self.lower
            && lower.trim().is_empty()
        {
            return Err("Normalized name cannot be empty".to_string());
        }

        Ok(())
    }
}
