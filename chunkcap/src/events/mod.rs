//! Signals, event hubs and telemetry sinks.
//!
//! This module provides:
//! - `Signal` and `Subscription` for typed in-process notifications
//! - `ConsoleEvents` and `NotebookEvents`, the shared notification surfaces
//! - The `EventSink` telemetry trait and a process-wide default sink

mod hub;
mod signal;
mod sink;

pub use hub::{
    ChunkConsoleOutput, ChunkExecCompleted, ChunkOutput, ConsoleEvents, ConsoleOutput,
    NotebookEvents,
};
pub use signal::{Signal, Subscription};
pub use sink::{chunk_event_data, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-wide telemetry sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide telemetry sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Returns the process-wide telemetry sink, or a `NoOpEventSink` if none is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
