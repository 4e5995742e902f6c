//! The per-chunk output ledger.

use super::{ChunkManifest, LineRecord};
use crate::core::{ChunkKey, OutputKind, OutputRecord};
use crate::errors::CaptureError;
use crate::layout::OutputLayout;
use dashmap::DashMap;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct LedgerEntry {
    next_ordinal: u64,
    records: Vec<OutputRecord>,
    log_started: bool,
    armed: bool,
    sealed: bool,
}

/// Tracks output ordinals and console logs for every chunk.
///
/// Each chunk's entry is only touched while holding its map entry, so
/// callers on different notification paths never observe the same ordinal.
#[derive(Debug)]
pub struct OutputLedger {
    layout: OutputLayout,
    entries: DashMap<ChunkKey, LedgerEntry>,
}

impl OutputLedger {
    /// Creates an empty ledger writing console logs under `layout`.
    #[must_use]
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            layout,
            entries: DashMap::new(),
        }
    }

    /// Returns the layout used for console logs and manifests.
    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Claims a chunk for a new execution.
    ///
    /// Re-executing a chunk starts its ordinals over, so the previous run's
    /// artifacts, console log and manifest are removed from the chunk folder.
    /// Removal failures are logged.
    pub fn begin_execution(&self, key: &ChunkKey) -> Result<(), CaptureError> {
        {
            let mut entry = self.entries.entry(key.clone()).or_default();
            if entry.armed {
                return Err(CaptureError::AlreadyArmed(key.clone()));
            }
            *entry = LedgerEntry {
                armed: true,
                ..LedgerEntry::default()
            };
        }
        self.clear_previous_run(key);
        debug!(chunk = %key, "ledger claimed");
        Ok(())
    }

    fn clear_previous_run(&self, key: &ChunkKey) {
        let Ok(children) = std::fs::read_dir(self.layout.chunk_dir(key)) else {
            return;
        };
        let console_log = self.layout.console_log(key);
        let manifest = self.layout.manifest(key);

        for path in children.filter_map(Result::ok).map(|entry| entry.path()) {
            let stale = path == console_log
                || path == manifest
                || (path.is_file() && self.layout.is_artifact_file(&path));
            if !stale {
                continue;
            }
            if let Err(e) = std::fs::remove_file(&path) {
                error!(path = %path.display(), error = %e, "failed to remove previous output");
            }
        }
    }

    /// Drops a chunk's claim without sealing it.
    pub fn release(&self, key: &ChunkKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.armed = false;
        }
    }

    /// Assigns the next ordinal for `kind` and records it.
    pub fn assign_next(&self, key: &ChunkKey, kind: OutputKind) -> Result<OutputRecord, CaptureError> {
        let mut entry = self.entries.entry(key.clone()).or_default();
        if entry.sealed {
            return Err(CaptureError::LedgerSealed(key.clone()));
        }
        let record = OutputRecord::new(entry.next_ordinal, kind);
        entry.next_ordinal += 1;
        entry.records.push(record);
        Ok(record)
    }

    /// Appends a line record to the chunk's console log.
    ///
    /// The first write of an execution truncates the log, as does any write
    /// with `truncate` set.
    pub fn append_text(
        &self,
        key: &ChunkKey,
        kind: OutputKind,
        text: &str,
        truncate: bool,
    ) -> Result<(), CaptureError> {
        let line = LineRecord::new(kind, text).encode()?;
        let path = self.layout.console_log(key);

        let mut entry = self.entries.entry(key.clone()).or_default();
        let truncate = truncate || !entry.log_started;

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        let mut file = options
            .open(&path)
            .map_err(|e| CaptureError::persistence(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| CaptureError::persistence(&path, e))?;

        entry.log_started = true;
        Ok(())
    }

    /// Seals a chunk's ledger and writes its manifest.
    ///
    /// Returns the records assigned during the execution. Manifest failures
    /// are logged.
    pub fn seal(&self, key: &ChunkKey) -> Vec<OutputRecord> {
        let records = {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.sealed = true;
            entry.armed = false;
            entry.records.clone()
        };

        let manifest = ChunkManifest::from_records(&self.layout, key, &records);
        if let Err(e) = manifest.write(self.layout.manifest(key)) {
            error!(chunk = %key, error = %e, "failed to write output manifest");
        }

        records
    }

    /// Returns every record assigned to a chunk, in ordinal order.
    #[must_use]
    pub fn records(&self, key: &ChunkKey) -> Vec<OutputRecord> {
        self.entries
            .get(key)
            .map(|entry| entry.records.clone())
            .unwrap_or_default()
    }

    /// Returns the last record assigned to a chunk.
    #[must_use]
    pub fn last_output(&self, key: &ChunkKey) -> Option<OutputRecord> {
        self.entries
            .get(key)
            .and_then(|entry| entry.records.last().copied())
    }

    /// Returns true once the chunk's ledger is sealed.
    #[must_use]
    pub fn is_sealed(&self, key: &ChunkKey) -> bool {
        self.entries.get(key).map_or(false, |entry| entry.sealed)
    }

    /// Returns true while an execution holds the chunk's claim.
    #[must_use]
    pub fn is_armed(&self, key: &ChunkKey) -> bool {
        self.entries.get(key).map_or(false, |entry| entry.armed)
    }
}
