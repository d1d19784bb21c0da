//! Minimized, reproducible executable archive bundling.
//!
//! The dependency set is declared as named units with explicit references;
//! minimization keeps the transitive closure of the entry point plus every
//! unit matching a keep pattern. The keep-list is the escape hatch for
//! units loaded by name rather than static reference - reachability
//! analysis cannot see dynamic loading, so those units stay explicit
//! configuration.
//!
//! Entries are written in canonical sorted order with fixed per-entry
//! metadata, so two bundles built from identical inputs are byte-identical
//! regardless of build machine or wall-clock time.

use crate::pipeline::checksum::sha256_file;
use crate::pipeline::error::{Error, Result};
use glob::Pattern;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A named member of the archive dependency set.
#[derive(Debug, Clone)]
pub struct DependencyUnit {
    /// Unit name, unique within the spec.
    pub name: String,
    /// Names of units this unit statically references.
    pub refs: Vec<String>,
}

/// One file owned by a unit, mapped to its path inside the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Owning unit name.
    pub unit: String,
    /// Source artifact on disk.
    pub source: PathBuf,
    /// Path of the entry inside the archive.
    pub archive_path: String,
}

/// Read-only descriptor for one archive build.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    /// The dependency set.
    pub units: Vec<DependencyUnit>,
    /// Candidate entries; minimization selects the retained subset.
    pub entries: Vec<ArchiveEntry>,
    /// Unit the reachability closure starts from.
    pub entry_point: String,
    /// Glob patterns naming units kept regardless of reachability.
    pub keep: Vec<String>,
    /// Archive file name, derived from the product display name.
    pub output_name: String,
}

/// Bundles the spec into `out_dir`, returning the archive path.
///
/// Fatal conditions: an entry point that is not a declared unit, a
/// reference to an undeclared unit, or an empty entry set after
/// minimization (a broken reachability configuration).
pub async fn bundle(spec: &ArchiveSpec, out_dir: &Path) -> Result<PathBuf> {
    let retained = minimize(&spec.units, &spec.entry_point, &spec.keep)?;
    log::debug!(
        "Retained {} of {} units after minimization",
        retained.len(),
        spec.units.len()
    );

    let mut selected: Vec<ArchiveEntry> = spec
        .entries
        .iter()
        .filter(|entry| retained.contains(&entry.unit))
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(Error::Reachability(
            "minimization produced an empty entry set".to_string(),
        ));
    }

    // Canonical entry order: sorted by archive path.
    selected.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));

    for pair in selected.windows(2) {
        if pair[0].archive_path == pair[1].archive_path {
            return Err(Error::Config(format!(
                "duplicate archive path `{}` (units `{}` and `{}`)",
                pair[0].archive_path, pair[0].unit, pair[1].unit
            )));
        }
    }

    let out_path = out_dir.join(&spec.output_name);
    let entries = selected;
    let target = out_path.clone();
    tokio::task::spawn_blocking(move || write_archive(&entries, &target))
        .await
        .map_err(|e| Error::GenericError(format!("archive task panicked: {}", e)))??;

    let checksum = sha256_file(&out_path).await?;
    log::info!("✓ Created archive {} (sha256 {})", out_path.display(), checksum);

    Ok(out_path)
}

/// Computes the set of retained unit names: the transitive closure of the
/// entry point, plus every unit matching a keep pattern.
fn minimize(units: &[DependencyUnit], entry_point: &str, keep: &[String]) -> Result<BTreeSet<String>> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for unit in units {
        let node = graph.add_node(unit.name.as_str());
        index.insert(unit.name.as_str(), node);
    }

    for unit in units {
        let from = index[unit.name.as_str()];
        for reference in &unit.refs {
            let Some(&to) = index.get(reference.as_str()) else {
                return Err(Error::Reachability(format!(
                    "unit `{}` references undeclared unit `{}`",
                    unit.name, reference
                )));
            };
            graph.add_edge(from, to, ());
        }
    }

    let Some(&start) = index.get(entry_point) else {
        return Err(Error::Reachability(format!(
            "entry point `{}` is not a declared unit",
            entry_point
        )));
    };

    let mut retained = BTreeSet::new();
    let mut bfs = Bfs::new(&graph, start);
    while let Some(node) = bfs.next(&graph) {
        retained.insert(graph[node].to_string());
    }

    let patterns = keep
        .iter()
        .map(|pattern| Pattern::new(pattern))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for unit in units {
        if patterns.iter().any(|pattern| pattern.matches(&unit.name)) {
            retained.insert(unit.name.clone());
        }
    }

    Ok(retained)
}

/// Writes the sorted entries into a zip container with fixed metadata,
/// publishing the file atomically.
fn write_archive(entries: &[ArchiveEntry], out_path: &Path) -> Result<()> {
    let dir = out_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| Error::Write {
        path: out_path.to_path_buf(),
        source,
    })?;

    {
        let mut writer = ZipWriter::new(tmp.as_file_mut());
        // Fixed epoch timestamp and permissions keep entry metadata
        // independent of the build machine.
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        for entry in entries {
            let data = match std::fs::read(&entry.source) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::MissingResource {
                        path: entry.source.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            };
            writer.start_file(entry.archive_path.as_str(), options)?;
            writer.write_all(&data)?;
        }

        writer.finish()?;
    }

    tmp.persist(out_path).map_err(|e| Error::Write {
        path: out_path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
