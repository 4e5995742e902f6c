//! Chunk identity and ledger record types.

use super::OutputKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one chunk of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    /// The owning document's opaque identifier.
    pub doc_id: String,
    /// The chunk's opaque identifier.
    pub chunk_id: String,
}

impl ChunkKey {
    /// Creates a new chunk key.
    #[must_use]
    pub fn new(doc_id: impl Into<String>, chunk_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            chunk_id: chunk_id.into(),
        }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.doc_id, self.chunk_id)
    }
}

/// One entry in a chunk's output ledger.
///
/// Ordinals are shared by every kind: console text, plots and rich content
/// are interleaved on a single sequence starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Position of this output within the chunk.
    pub ordinal: u64,
    /// What was produced.
    pub kind: OutputKind,
}

impl OutputRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(ordinal: u64, kind: OutputKind) -> Self {
        Self { ordinal, kind }
    }
}
