//! Multi-target packaging pipeline library
//!
//! This library provides the core pipeline for producing platform
//! distributables from one resolved product name:
//! - a minimized, reproducible executable archive
//! - filtered AppImage, Inno Setup, packr and macOS descriptors
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use error::{CliError, DistpackError, Result};
