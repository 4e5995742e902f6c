//! Fixtures wiring a runtime to test doubles.

use super::{ManualFileMonitor, RecordingDevice};
use crate::config::CaptureConfig;
use crate::context::{CaptureRuntime, ChunkExecContext};
use crate::core::ChunkKey;
use crate::errors::CaptureError;
use crate::events::{
    ChunkConsoleOutput, ChunkExecCompleted, ChunkOutput, CollectingEventSink, ConsoleEvents,
    NotebookEvents, Subscription,
};
use crate::monitor::MonitorHandle;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Session context identifier used by fixtures.
pub const TEST_SESSION_CONTEXT_ID: &str = "test-session";

/// Records everything emitted on a notebook hub.
pub struct NotebookRecorder {
    completions: Arc<Mutex<Vec<ChunkExecCompleted>>>,
    outputs: Arc<Mutex<Vec<ChunkOutput>>>,
    console: Arc<Mutex<Vec<ChunkConsoleOutput>>>,
    plots: Arc<Mutex<Vec<PathBuf>>>,
    plot_completions: Arc<Mutex<Vec<ChunkKey>>>,
    _subscriptions: Vec<Subscription>,
}

impl NotebookRecorder {
    /// Subscribes to every listener-facing signal of `notebook`.
    #[must_use]
    pub fn attach(notebook: &NotebookEvents) -> Self {
        let completions: Arc<Mutex<Vec<ChunkExecCompleted>>> = Arc::default();
        let outputs: Arc<Mutex<Vec<ChunkOutput>>> = Arc::default();
        let console: Arc<Mutex<Vec<ChunkConsoleOutput>>> = Arc::default();
        let plots: Arc<Mutex<Vec<PathBuf>>> = Arc::default();
        let plot_completions: Arc<Mutex<Vec<ChunkKey>>> = Arc::default();

        let subscriptions = vec![
            notebook.chunk_exec_completed.subscribe(push_into(&completions)),
            notebook.chunk_output.subscribe(push_into(&outputs)),
            notebook.chunk_console_output.subscribe(push_into(&console)),
            notebook.plot_output.subscribe(push_into(&plots)),
            notebook.plot_output_complete.subscribe(push_into(&plot_completions)),
        ];

        Self {
            completions,
            outputs,
            console,
            plots,
            plot_completions,
            _subscriptions: subscriptions,
        }
    }

    /// Completion events, in order.
    #[must_use]
    pub fn completions(&self) -> Vec<ChunkExecCompleted> {
        self.completions.lock().clone()
    }

    /// Number of completion events for `key`.
    #[must_use]
    pub fn completion_count(&self, key: &ChunkKey) -> usize {
        self.completions.lock().iter().filter(|c| &c.key == key).count()
    }

    /// Relocated outputs, in order.
    #[must_use]
    pub fn outputs(&self) -> Vec<ChunkOutput> {
        self.outputs.lock().clone()
    }

    /// Console outputs, in order.
    #[must_use]
    pub fn console_outputs(&self) -> Vec<ChunkConsoleOutput> {
        self.console.lock().clone()
    }

    /// Canonical paths of relocated plots.
    #[must_use]
    pub fn plots(&self) -> Vec<PathBuf> {
        self.plots.lock().clone()
    }

    /// Chunks whose graphics capture finished.
    #[must_use]
    pub fn plot_completions(&self) -> Vec<ChunkKey> {
        self.plot_completions.lock().clone()
    }
}

impl std::fmt::Debug for NotebookRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookRecorder")
            .field("completions", &self.completions.lock().len())
            .field("outputs", &self.outputs.lock().len())
            .finish_non_exhaustive()
    }
}

fn push_into<T: Clone + Send + 'static>(
    target: &Arc<Mutex<Vec<T>>>,
) -> impl Fn(&T) + Send + Sync + 'static {
    let target = target.clone();
    move |value: &T| target.lock().push(value.clone())
}

/// A runtime backed by a manual monitor, a recording device and a
/// collecting event sink.
#[derive(Debug)]
pub struct CaptureFixture {
    /// The runtime under test.
    pub runtime: Arc<CaptureRuntime>,
    /// The device seam.
    pub device: Arc<RecordingDevice>,
    /// The monitor seam.
    pub monitor: Arc<ManualFileMonitor>,
    /// Collected telemetry.
    pub sink: Arc<CollectingEventSink>,
    /// Collected notebook events.
    pub recorder: NotebookRecorder,
}

impl CaptureFixture {
    /// Creates a fixture writing under `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CaptureError> {
        Self::with_device(root, RecordingDevice::new())
    }

    /// Creates a fixture with a preconfigured device.
    pub fn with_device(root: impl AsRef<Path>, device: RecordingDevice) -> Result<Self, CaptureError> {
        let config = CaptureConfig::new()
            .with_output_root(root.as_ref())
            .with_session_context_id(TEST_SESSION_CONTEXT_ID);
        let device = Arc::new(device);
        let monitor = Arc::new(ManualFileMonitor::new());
        let sink = Arc::new(CollectingEventSink::new());

        let runtime = CaptureRuntime::new(config, device.clone(), monitor.clone())?
            .with_event_sink(sink.clone());
        let recorder = NotebookRecorder::attach(runtime.notebook());

        Ok(Self {
            runtime: Arc::new(runtime),
            device,
            monitor,
            sink,
            recorder,
        })
    }

    /// Creates an idle context for a chunk.
    pub fn context(&self, doc_id: &str, chunk_id: &str) -> Result<Arc<ChunkExecContext>, CaptureError> {
        self.runtime.context(doc_id, chunk_id)
    }

    /// The console hub the runtime listens to.
    #[must_use]
    pub fn console(&self) -> &ConsoleEvents {
        self.runtime.console()
    }

    /// The notebook hub the runtime emits on.
    #[must_use]
    pub fn notebook(&self) -> &NotebookEvents {
        self.runtime.notebook()
    }

    /// Completes the latest monitor registration with a listing read from
    /// disk. Returns its handle.
    pub fn activate_graphics(&self) -> Option<MonitorHandle> {
        let handle = self.monitor.last_handle()?;
        self.monitor.complete_registration_from_disk(&handle);
        Some(handle)
    }
}
