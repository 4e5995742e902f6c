//! Output ledger: ordinal assignment and console log persistence.
//!
//! This module provides:
//! - `OutputLedger` for race-free per-chunk ordinal assignment
//! - Line records for the append-only console log
//! - The per-chunk manifest written when a ledger is sealed

mod line_record;
mod manifest;
mod store;

pub use line_record::{read_console_log, LineRecord};
pub use manifest::{ChunkManifest, ManifestEntry};
pub use store::OutputLedger;
