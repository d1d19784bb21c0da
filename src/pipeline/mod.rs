//! Core packaging pipeline.
//!
//! One run resolves the product name triple once, builds an immutable token
//! map from it, and fans out into concurrent platform-specific outputs: a
//! minimized executable archive and filtered installer descriptors. Every
//! output is deterministic - identical inputs produce byte-identical
//! artifacts on any machine.

pub mod archive;
pub mod checksum;
pub mod env;
pub mod error;
pub mod name;
pub mod targets;
pub mod task;
pub mod template;
pub mod tokens;
pub mod utils;

// Re-export all public types
pub use archive::{ArchiveEntry, ArchiveSpec, DependencyUnit};
pub use env::EnvironmentView;
pub use error::{Context, Error, ErrorExt, Result};
pub use name::{NameResolver, ProductName};
pub use task::{Orchestrator, PipelineTask, RunSummary, TaskOutcome, TaskReport};
pub use template::{LineRule, TemplateFormat, TemplateTarget};
pub use tokens::TokenMap;
