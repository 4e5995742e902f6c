//! # Chunkcap
//!
//! Output capture for document chunks executed in an interactive
//! interpreter session.
//!
//! While a chunk runs, chunkcap attributes everything it produces to that
//! chunk:
//!
//! - **Console text**: recorded on a per-chunk ordinal sequence and appended
//!   to the chunk's console log
//! - **Plots**: a graphics device is pointed at the chunk's folder and a
//!   file monitor picks up each image it writes
//! - **Rich content**: fragments are relocated into the chunk folder and
//!   their auxiliary assets merged into one per-document shared folder
//! - **Completion**: a single `chunk_exec_completed` event once both the
//!   console and graphics capture have finished
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chunkcap::prelude::*;
//!
//! let config = CaptureConfig::new().with_output_root("/tmp/notebook-cache");
//! let runtime = Arc::new(CaptureRuntime::new(config, device, monitor)?);
//!
//! let ctx = runtime.context("doc-1", "chunk-3")?;
//! ctx.connect()?;
//! // ... the interpreter runs the chunk and returns to the prompt ...
//! ctx.wait_completed().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod graphics;
pub mod layout;
pub mod ledger;
pub mod monitor;
pub mod observability;
pub mod relocation;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CaptureConfig, LoggingConfig, PlotConfig, PlotFormat};
    pub use crate::context::{CaptureRuntime, ChunkExecContext};
    pub use crate::core::{CapturePhase, ChunkKey, ConsoleStream, OutputKind, OutputRecord};
    pub use crate::errors::{CaptureError, ErrorCategory};
    pub use crate::events::{
        ChunkConsoleOutput, ChunkExecCompleted, ChunkOutput, ConsoleEvents, EventSink,
        LoggingEventSink, NoOpEventSink, NotebookEvents, Signal, Subscription,
    };
    pub use crate::graphics::{DeviceSpec, GraphicsCaptureSession, GraphicsDevice, PlotNaming};
    pub use crate::layout::OutputLayout;
    pub use crate::ledger::{ChunkManifest, OutputLedger};
    #[cfg(feature = "polling")]
    pub use crate::monitor::PollingFileMonitor;
    pub use crate::monitor::{FileChangeEvent, FileChangeKind, FileInfo, FileMonitor, MonitorHandle};
    pub use crate::observability::init_tracing;
    pub use crate::utils::iso_timestamp;
}
