//! Input tree reading.
//!
//! Walks an input prefix recursively, collects `.json` documents in sorted
//! order, and decodes them in parallel. Each document is JSON lines: one
//! record per non-empty line (a single-object document is the one-line case).

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that can occur while reading an input tree.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("malformed record at {path}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Read every record of type `T` under `root`.
///
/// Decoding is strict: a line that does not match the declared schema aborts
/// the batch, carrying the offending path and line number. An empty tree is
/// not an error; it yields an empty batch.
pub fn read_records<T>(root: &Path) -> Result<Vec<T>, SourceError>
where
    T: DeserializeOwned + Send,
{
    let files = collect_documents(root)?;
    if files.is_empty() {
        tracing::warn!("no .json documents under {}", root.display());
        return Ok(Vec::new());
    }
    tracing::debug!(
        "decoding {} documents under {}",
        files.len(),
        root.display()
    );

    // Decode documents in parallel; collect preserves file order.
    let batches: Vec<Vec<T>> = files
        .par_iter()
        .map(|path| read_document(path))
        .collect::<Result<_, _>>()?;

    Ok(batches.into_iter().flatten().collect())
}

/// Collect every `.json` file under `root`, sorted by file name so batches
/// decode in the same order on every run.
fn collect_documents(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let is_json = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_document<T>(path: &Path) -> Result<Vec<T>, SourceError>
where
    T: DeserializeOwned,
{
    let text = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| SourceError::Malformed {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}
