//! Artifact relocation and shared asset merging.
//!
//! This module provides:
//! - `move_file`, which consumes a source file into its canonical location
//! - `merge_shared_assets`, a best-effort per-entry merge of an auxiliary
//!   asset folder into the document-wide shared folder

use crate::errors::CaptureError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Moves `from` to `to`, replacing any existing file.
///
/// Falls back to copy-then-remove when a rename is not possible, for
/// instance across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<(), CaptureError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| CaptureError::relocation(from, to, e))?;
    fs::remove_file(from).map_err(|e| CaptureError::relocation(from, to, e))
}

/// The outcome of merging one entry.
#[derive(Debug)]
pub struct EntryOutcome {
    /// Path relative to the merged folder's root.
    pub relative: PathBuf,
    /// Whether the entry made it into the shared folder.
    pub result: Result<(), CaptureError>,
}

/// Per-entry results of a shared asset merge.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// One outcome per file or directory found under the source.
    pub entries: Vec<EntryOutcome>,
    /// Outcome of removing the emptied source folder.
    pub cleanup: Option<Result<(), CaptureError>>,
}

impl MergeReport {
    /// Number of entries merged successfully.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.entries.iter().filter(|entry| entry.result.is_ok()).count()
    }

    /// Every error encountered, cleanup included.
    #[must_use]
    pub fn failures(&self) -> Vec<&CaptureError> {
        self.entries
            .iter()
            .filter_map(|entry| entry.result.as_ref().err())
            .chain(self.cleanup.iter().filter_map(|cleanup| cleanup.as_ref().err()))
            .collect()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Moves every entry of `source` into `shared`, keyed by relative path.
///
/// Entries already present in `shared` are overwritten; identical names
/// are expected to carry identical content. A failed entry does not stop
/// the others. The source folder is removed afterwards.
pub fn merge_shared_assets(source: &Path, shared: &Path) -> MergeReport {
    let mut report = MergeReport::default();

    let entries: Vec<walkdir::DirEntry> = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                let relative = e
                    .path()
                    .and_then(|p| p.strip_prefix(source).ok())
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                let to = shared.join(&relative);
                let from = source.join(&relative);
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk loop"));
                report.entries.push(EntryOutcome {
                    relative,
                    result: Err(CaptureError::relocation(from, to, io)),
                });
                None
            }
        })
        .collect();

    for entry in entries {
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = shared.join(relative);
        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| CaptureError::relocation(entry.path(), &target, e))
        } else {
            merge_file(entry.path(), &target)
        };
        report.entries.push(EntryOutcome {
            relative: relative.to_path_buf(),
            result,
        });
    }

    report.cleanup = Some(
        fs::remove_dir_all(source).map_err(|e| CaptureError::relocation(source, shared, e)),
    );
    report
}

fn merge_file(from: &Path, to: &Path) -> Result<(), CaptureError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| CaptureError::relocation(from, to, e))?;
    }
    move_file(from, to)
}
