//! Per-chunk output manifest written when a chunk's ledger is sealed.

use crate::core::{ChunkKey, OutputKind, OutputRecord};
use crate::errors::CaptureError;
use crate::layout::OutputLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An ordered index of everything a chunk produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// The document identifier.
    pub doc_id: String,
    /// The chunk identifier.
    pub chunk_id: String,
    /// When the ledger was sealed (ISO 8601).
    pub completed_at: String,
    /// Outputs in ordinal order.
    pub outputs: Vec<ManifestEntry>,
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The output's ordinal.
    pub ordinal: u64,
    /// The output's kind.
    pub kind: OutputKind,
    /// File name relative to the chunk directory.
    pub file: String,
}

impl ChunkManifest {
    /// Builds a manifest from a chunk's records.
    #[must_use]
    pub fn from_records(layout: &OutputLayout, key: &ChunkKey, records: &[OutputRecord]) -> Self {
        let outputs = records
            .iter()
            .map(|record| ManifestEntry {
                ordinal: record.ordinal,
                kind: record.kind,
                file: layout
                    .artifact_path(key, record)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            doc_id: key.doc_id.clone(),
            chunk_id: key.chunk_id.clone(),
            completed_at: crate::utils::iso_timestamp(),
            outputs,
        }
    }

    /// Writes the manifest as pretty JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| CaptureError::persistence(path, e))
    }

    /// Reads a manifest.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_file_names() {
        let layout = OutputLayout::new("/out");
        let key = ChunkKey::new("d1", "c1");
        let records = [
            OutputRecord::new(0, OutputKind::ConsoleOutput),
            OutputRecord::new(1, OutputKind::Plot),
        ];

        let manifest = ChunkManifest::from_records(&layout, &key, &records);

        assert_eq!(manifest.outputs.len(), 2);
        assert_eq!(manifest.outputs[0].file, "console.jsonl");
        assert_eq!(manifest.outputs[1].file, "000001.png");
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let key = ChunkKey::new("d", "c");
        let manifest =
            ChunkManifest::from_records(&layout, &key, &[OutputRecord::new(0, OutputKind::RichContent)]);

        let path = dir.path().join("manifest.json");
        manifest.write(&path).unwrap();

        assert_eq!(ChunkManifest::read(&path).unwrap(), manifest);
    }
}
