//! Chunk execution contexts.
//!
//! This module provides:
//! - `CaptureRuntime`, the session-wide collaborators shared by contexts
//! - `ChunkExecContext`, the per-chunk lifecycle that joins console and
//!   graphics completion into one event

mod execution;
mod runtime;

#[cfg(test)]
mod context_tests;

pub use execution::ChunkExecContext;
pub use runtime::CaptureRuntime;
