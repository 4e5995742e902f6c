//! Testing utilities for chunk capture.
//!
//! This module provides:
//! - A manually driven file monitor and a recording graphics device
//! - A fixture wiring both into a runtime, plus a notebook event recorder
//! - Assertions over ledgers and console logs

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_console_log, assert_ordinals_contiguous, assert_record_kinds};
pub use fixtures::{CaptureFixture, NotebookRecorder, TEST_SESSION_CONTEXT_ID};
pub use mocks::{ManualFileMonitor, RecordingDevice};
