//! Core domain model types for chunkcap.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Output kinds and console streams
//! - Chunk keys and ledger records
//! - Execution context lifecycle phases

mod kind;
mod phase;
mod record;

pub use kind::{ConsoleStream, OutputKind};
pub use phase::CapturePhase;
pub use record::{ChunkKey, OutputRecord};
