//! Built-in pipeline assembly.
//!
//! Wires the task DAG the tool runs: name resolution feeds every
//! platform-specific output, the four platform filters and the archive
//! bundle depend only on it and write to disjoint staging destinations, so
//! they execute concurrently. Template sources are discovered by include
//! pattern at execution time - a pattern matching nothing fails the owning
//! task rather than silently producing no output.

use crate::config::{ArchiveConfig, PipelineConfig};
use crate::pipeline::archive::{self, ArchiveEntry, ArchiveSpec, DependencyUnit};
use crate::pipeline::env::EnvironmentView;
use crate::pipeline::error::{Context, Error, Result};
use crate::pipeline::name::{DEFAULT_DISPLAY_NAME, NameResolver, ProductName};
use crate::pipeline::task::{Orchestrator, PipelineTask, RunSummary};
use crate::pipeline::template::{self, LineRule, TemplateFormat, TemplateTarget};
use crate::pipeline::tokens::TokenMap;
use crate::pipeline::utils;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Task id of the name-resolution step every output depends on.
pub const RESOLVE_NAMES: &str = "resolve-names";
/// Task id of the structured-resource sweep.
pub const PROCESS_RESOURCES: &str = "process-resources";
/// Task id of the AppImage desktop-entry filter.
pub const FILTER_APPIMAGE: &str = "filter-appimage";
/// Task id of the Inno Setup script filter.
pub const FILTER_INNOSETUP: &str = "filter-innosetup";
/// Task id of the Inno Setup Pascal helper filter.
pub const FILTER_INNOSETUP_SCRIPTS: &str = "filter-innosetup-scripts";
/// Task id of the packr manifest filter.
pub const FILTER_PACKR: &str = "filter-packr";
/// Task id of the macOS Info.plist filter.
pub const FILTER_OSX: &str = "filter-osx";
/// Task id of the archive bundle step.
pub const BUNDLE_ARCHIVE: &str = "bundle-archive";

/// Properties file recording the resolved name triple.
pub const STATE_FILE: &str = "app-name.properties";
/// Machine-readable per-task outcome report.
pub const REPORT_FILE: &str = "pipeline-report.json";

const FILTERED_DIR: &str = "filtered-resources";
const PACKR_DIR: &str = "packr";
const RESOURCES_DIR: &str = "resources";

/// Shared, read-only state for one pipeline run.
///
/// The resolved names are published once by the resolve task and read-only
/// afterwards, so concurrent readers need no synchronization.
struct RunContext {
    config: PipelineConfig,
    env: EnvironmentView,
    name_override: Option<String>,
    lower_override: Option<String>,
    resolved: OnceLock<(ProductName, TokenMap)>,
}

impl RunContext {
    fn resolved(&self) -> Result<&(ProductName, TokenMap)> {
        self.resolved
            .get()
            .ok_or_else(|| Error::GenericError("product names are not resolved".to_string()))
    }
}

/// Assembles and runs the built-in pipeline.
///
/// Produces, under the staging directory: the minimized executable archive,
/// the filtered platform descriptors, the name-triple state file and the
/// JSON run report. Returns the per-task summary; the run as a whole
/// succeeded only if [`RunSummary::success`] holds.
pub async fn run_pipeline(
    config: PipelineConfig,
    name_override: Option<String>,
    lower_override: Option<String>,
    env: EnvironmentView,
) -> Result<RunSummary> {
    let staging = config.staging.dir.clone();
    utils::fs::create_dir_all(&staging).await?;

    let ctx = Arc::new(RunContext {
        config,
        env,
        name_override,
        lower_override,
        resolved: OnceLock::new(),
    });

    let mut orchestrator = Orchestrator::new();

    {
        let ctx = Arc::clone(&ctx);
        orchestrator.add(PipelineTask::new(RESOLVE_NAMES, &[], move || {
            resolve_names(ctx)
        }));
    }

    if ctx.config.resources.root.is_some() {
        let ctx = Arc::clone(&ctx);
        orchestrator.add(PipelineTask::new(
            PROCESS_RESOURCES,
            &[RESOLVE_NAMES],
            move || process_resources(ctx),
        ));
    }

    add_filter_task(
        &mut orchestrator,
        &ctx,
        FILTER_APPIMAGE,
        ctx.config.resources.appimage.clone(),
        "*.desktop",
        staging.join(FILTERED_DIR),
        TemplateFormat::StructuredExpand,
        Vec::new(),
    );
    add_filter_task(
        &mut orchestrator,
        &ctx,
        FILTER_INNOSETUP,
        ctx.config.resources.innosetup.clone(),
        "*.iss",
        staging.join(FILTERED_DIR),
        TemplateFormat::StructuredExpand,
        Vec::new(),
    );
    add_filter_task(
        &mut orchestrator,
        &ctx,
        FILTER_INNOSETUP_SCRIPTS,
        ctx.config.resources.innosetup.clone(),
        "*.pas",
        staging.join(FILTERED_DIR),
        TemplateFormat::LineReplace,
        ctx.config.resources.script_rules.clone(),
    );
    add_filter_task(
        &mut orchestrator,
        &ctx,
        FILTER_PACKR,
        ctx.config.resources.packr.clone(),
        "*.json",
        staging.join(PACKR_DIR),
        TemplateFormat::LineReplace,
        ctx.config.resources.packr_rules.clone(),
    );
    add_filter_task(
        &mut orchestrator,
        &ctx,
        FILTER_OSX,
        ctx.config.resources.osx.clone(),
        "Info.plist",
        staging.join(FILTERED_DIR),
        TemplateFormat::StructuredExpand,
        Vec::new(),
    );

    if !ctx.config.archive.units.is_empty() {
        let ctx = Arc::clone(&ctx);
        orchestrator.add(PipelineTask::new(
            BUNDLE_ARCHIVE,
            &[RESOLVE_NAMES],
            move || bundle_archive(ctx),
        ));
    } else {
        log::debug!("No archive units declared, skipping archive registration");
    }

    let summary = orchestrator.run().await?;

    if let Err(e) = summary.write_json(&staging.join(REPORT_FILE)).await {
        log::warn!("Failed to write run report: {}", e);
    }

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn add_filter_task(
    orchestrator: &mut Orchestrator,
    ctx: &Arc<RunContext>,
    id: &'static str,
    source_dir: PathBuf,
    include: &'static str,
    dest_dir: PathBuf,
    format: TemplateFormat,
    rules: Vec<LineRule>,
) {
    let ctx = Arc::clone(ctx);
    orchestrator.add(PipelineTask::new(id, &[RESOLVE_NAMES], move || {
        filter_sources(ctx, source_dir, include, dest_dir, format, rules)
    }));
}

/// Resolves the product name triple, persists it, exports it to the CI
/// environment file and publishes the run's token map.
async fn resolve_names(ctx: Arc<RunContext>) -> Result<()> {
    let resolver = NameResolver::new(
        ctx.config.staging.dir.join(STATE_FILE),
        DEFAULT_DISPLAY_NAME,
    );
    let configured = ctx
        .name_override
        .as_deref()
        .or(ctx.config.product.name.as_deref());
    let lower = ctx
        .lower_override
        .as_deref()
        .or(ctx.config.product.lower.as_deref());

    let product = resolver.resolve(configured, lower);
    log::info!(
        "Resolved product name: {} ({} / {})",
        product.display(),
        product.normalized(),
        product.upper()
    );

    resolver.persist(&product).await?;
    resolver.export_ci_env(&product, &ctx.env).await?;

    let mut statics = ctx.config.tokens.clone();
    if let Some(website) = &ctx.config.product.website {
        statics
            .entry("website".to_string())
            .or_insert_with(|| website.clone());
    }
    let tokens = TokenMap::build(&product, &ctx.env, &statics);

    let _ = ctx.resolved.set((product, tokens));
    Ok(())
}

/// Filters every source matching `include` under `source_dir` into
/// `dest_dir`.
async fn filter_sources(
    ctx: Arc<RunContext>,
    source_dir: PathBuf,
    include: &'static str,
    dest_dir: PathBuf,
    format: TemplateFormat,
    rules: Vec<LineRule>,
) -> Result<()> {
    let (_, tokens) = ctx.resolved()?;

    for source in discover(&source_dir.join(include))? {
        let file_name = source
            .file_name()
            .context("template source has no file name")?;
        let target = TemplateTarget {
            destination: dest_dir.join(file_name),
            source,
            format,
            rules: rules.clone(),
        };
        template::apply(&target, tokens).await?;
        log::info!(
            "✓ Filtered {} -> {}",
            target.source.display(),
            target.destination.display()
        );
    }
    Ok(())
}

/// Structured-expansion sweep over `*.properties` and `*.xml` files beneath
/// the configured resources root.
///
/// Unlike the declared platform filters, an empty sweep is not an error -
/// the root is a tree, not a specific expected file. A missing root is.
async fn process_resources(ctx: Arc<RunContext>) -> Result<()> {
    let (_, tokens) = ctx.resolved()?;
    let Some(root) = ctx.config.resources.root.clone() else {
        return Ok(());
    };
    if !root.is_dir() {
        return Err(Error::MissingResource { path: root });
    }

    let dest_root = ctx.config.staging.dir.join(RESOURCES_DIR);
    let mut sources: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("properties") | Some("xml")
            )
        })
        .collect();
    sources.sort();

    for source in sources {
        let rel = source
            .strip_prefix(&root)
            .context("resource path escapes the resources root")?
            .to_path_buf();
        let target = TemplateTarget {
            destination: dest_root.join(rel),
            source,
            format: TemplateFormat::StructuredExpand,
            rules: Vec::new(),
        };
        template::apply(&target, tokens).await?;
        log::info!("✓ Filtered {}", target.destination.display());
    }
    Ok(())
}

/// Bundles the declared archive units into the staging area.
async fn bundle_archive(ctx: Arc<RunContext>) -> Result<()> {
    let (product, _) = ctx.resolved()?;
    let spec = build_archive_spec(&ctx.config.archive, product)?;
    archive::bundle(&spec, &ctx.config.staging.dir).await?;
    Ok(())
}

/// Flattens the archive configuration into a bundling spec, deriving the
/// output name from the resolved product.
fn build_archive_spec(config: &ArchiveConfig, product: &ProductName) -> Result<ArchiveSpec> {
    let entry_point = config
        .entry_point
        .clone()
        .ok_or_else(|| Error::Reachability("archive entry point is not declared".to_string()))?;

    let units = config
        .units
        .iter()
        .map(|unit| DependencyUnit {
            name: unit.name.clone(),
            refs: unit.refs.clone(),
        })
        .collect();

    let entries = config
        .units
        .iter()
        .flat_map(|unit| {
            unit.files.iter().map(|file| ArchiveEntry {
                unit: unit.name.clone(),
                source: file.source.clone(),
                archive_path: file.archive_path.clone(),
            })
        })
        .collect();

    Ok(ArchiveSpec {
        units,
        entries,
        entry_point,
        keep: config.keep.clone(),
        output_name: format!("{}.{}", product.display(), config.extension),
    })
}

/// Returns the sorted files matching an include pattern.
///
/// A pattern matching nothing is a missing resource: every declared filter
/// expects its sources to exist, and a deleted source must be reported
/// rather than silently skipped.
fn discover(pattern: &Path) -> Result<Vec<PathBuf>> {
    let text = pattern.to_string_lossy();
    let mut found: Vec<PathBuf> = glob::glob(&text)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    found.sort();

    if found.is_empty() {
        return Err(Error::MissingResource {
            path: pattern.to_path_buf(),
        });
    }
    Ok(found)
}
