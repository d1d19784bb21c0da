//! Command line interface for the packaging pipeline.

mod args;

pub use args::Args;

use crate::config::PipelineConfig;
use crate::error::{CliError, Result};
use crate::pipeline::env::EnvironmentView;
use crate::pipeline::targets;
use crate::pipeline::task::{RunSummary, TaskOutcome};
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "distpack.toml";

/// Main CLI entry point.
///
/// Runs the pipeline and maps its outcome to the process exit code: 0 iff
/// every task succeeded, 1 otherwise, with the first failed or
/// skip-causing task named.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    if let Some(output) = args.output {
        config.staging.dir = output;
    }

    let env = EnvironmentView::capture();
    let summary = targets::run_pipeline(config, args.name, args.lower, env).await?;

    print_summary(&summary);

    if summary.success() {
        log::info!("✓ Pipeline succeeded");
        Ok(0)
    } else {
        if let Some(first) = summary.first_failure() {
            log::error!("✗ Pipeline failed: first failing task `{}`", first.id);
        }
        Ok(1)
    }
}

/// Enumerates every task's outcome.
fn print_summary(summary: &RunSummary) {
    for report in summary.reports() {
        match &report.outcome {
            TaskOutcome::Success => log::info!("✓ {}", report.id),
            TaskOutcome::Failed { detail } => {
                log::error!("✗ {} failed: {}", report.id, detail);
            }
            TaskOutcome::Skipped { dependency } => {
                log::warn!(
                    "- {} skipped (dependency `{}` did not succeed)",
                    report.id,
                    dependency
                );
            }
        }
    }
}
