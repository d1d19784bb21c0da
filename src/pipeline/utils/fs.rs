//! File system utilities for the pipeline.
//!
//! Provides idempotent directory creation and atomic file publication so a
//! failed task never leaves a partial output behind.

use crate::pipeline::error::{Error, ErrorExt, Result};
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Creates all of the directories of the specified path.
///
/// Already idempotent - succeeds even if the directories exist.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Writes `contents` to `path` atomically.
///
/// The bytes go to a temporary file in the destination directory first and
/// are published with a rename, so concurrent readers and failed runs never
/// observe a partially written file. Parent directories are created as
/// needed.
pub async fn atomic_write(path: &Path, contents: Vec<u8>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating output directory", parent)?;
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?;
        tmp.write_all(&contents).map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?;
        tmp.persist(&path).map_err(|e| Error::Write {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(())
    })
    .await
    .map_err(|e| Error::GenericError(format!("write task panicked: {}", e)))?
}

/// Appends `contents` to `path`, creating the file if it does not exist.
///
/// Used for the CI environment file, which later pipeline stages also append
/// to - the file is shared, so this is the one write that is not atomic.
pub async fn append(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .fs_context("opening file for append", path)?;
    file.write_all(contents)
        .await
        .fs_context("appending to file", path)?;
    file.flush().await.fs_context("flushing file", path)?;
    Ok(())
}
