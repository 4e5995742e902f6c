//! Shared collaborators for every chunk execution in a session.

use super::ChunkExecContext;
use crate::config::CaptureConfig;
use crate::core::ChunkKey;
use crate::errors::CaptureError;
use crate::events::{get_event_sink, ConsoleEvents, EventSink, NotebookEvents};
use crate::graphics::{DeviceSpec, GraphicsDevice, PlotNaming};
use crate::layout::OutputLayout;
use crate::ledger::OutputLedger;
use crate::monitor::FileMonitor;
use std::fmt;
use std::sync::Arc;

/// Everything an execution context needs beyond its own identity.
///
/// One runtime serves a whole interpreter session: it owns the ledger, the
/// event hubs and the device and monitor seams.
pub struct CaptureRuntime {
    config: Arc<CaptureConfig>,
    layout: OutputLayout,
    naming: PlotNaming,
    ledger: Arc<OutputLedger>,
    console: Arc<ConsoleEvents>,
    notebook: Arc<NotebookEvents>,
    device: Arc<dyn GraphicsDevice>,
    monitor: Arc<dyn FileMonitor>,
    event_sink: Arc<dyn EventSink>,
}

impl CaptureRuntime {
    /// Creates a runtime with fresh event hubs and the process event sink.
    pub fn new(
        config: CaptureConfig,
        device: Arc<dyn GraphicsDevice>,
        monitor: Arc<dyn FileMonitor>,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        let layout = config.layout();
        let naming = config.plot_naming()?;

        Ok(Self {
            ledger: Arc::new(OutputLedger::new(layout.clone())),
            config: Arc::new(config),
            layout,
            naming,
            console: Arc::new(ConsoleEvents::new()),
            notebook: Arc::new(NotebookEvents::new()),
            device,
            monitor,
            event_sink: get_event_sink(),
        })
    }

    /// Uses an existing console hub.
    #[must_use]
    pub fn with_console(mut self, console: Arc<ConsoleEvents>) -> Self {
        self.console = console;
        self
    }

    /// Uses an existing notebook hub.
    #[must_use]
    pub fn with_notebook(mut self, notebook: Arc<NotebookEvents>) -> Self {
        self.notebook = notebook;
        self
    }

    /// Overrides the telemetry sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Creates an idle execution context for one chunk.
    pub fn context(
        self: &Arc<Self>,
        doc_id: impl Into<String>,
        chunk_id: impl Into<String>,
    ) -> Result<Arc<ChunkExecContext>, CaptureError> {
        let key = ChunkKey::new(doc_id, chunk_id);
        self.layout.validate_key(&key)?;
        Ok(ChunkExecContext::new(self.clone(), key))
    }

    /// The device arming parameters for a chunk.
    #[must_use]
    pub fn device_spec(&self, key: &ChunkKey) -> DeviceSpec {
        DeviceSpec::new(self.layout.chunk_dir(key), &self.naming, &self.config.plots)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Returns the output layout.
    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Returns the plot naming convention.
    #[must_use]
    pub fn naming(&self) -> &PlotNaming {
        &self.naming
    }

    /// Returns the output ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<OutputLedger> {
        &self.ledger
    }

    /// Returns the console hub.
    #[must_use]
    pub fn console(&self) -> &Arc<ConsoleEvents> {
        &self.console
    }

    /// Returns the notebook hub.
    #[must_use]
    pub fn notebook(&self) -> &Arc<NotebookEvents> {
        &self.notebook
    }

    /// Returns the graphics device.
    #[must_use]
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Returns the file monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<dyn FileMonitor> {
        &self.monitor
    }

    /// Returns the telemetry sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }
}

impl fmt::Debug for CaptureRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRuntime")
            .field("output_root", &self.layout.root())
            .field("session_context_id", &self.config.session_context_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualFileMonitor, RecordingDevice};

    fn runtime(config: CaptureConfig) -> Result<CaptureRuntime, CaptureError> {
        CaptureRuntime::new(
            config,
            Arc::new(RecordingDevice::new()),
            Arc::new(ManualFileMonitor::new()),
        )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = CaptureConfig::new();
        config.poll_interval_ms = 0;
        assert!(matches!(runtime(config), Err(CaptureError::Config(_))));
    }

    #[test]
    fn test_context_validates_identifiers() {
        let runtime = Arc::new(runtime(CaptureConfig::new().with_output_root("/out")).unwrap());

        assert!(runtime.context("doc", "chunk").is_ok());
        assert!(matches!(
            runtime.context("doc", "../escape"),
            Err(CaptureError::InvalidIdentifier(_))
        ));
        assert!(runtime.context("", "chunk").is_err());
    }

    #[test]
    fn test_device_spec_targets_chunk_dir() {
        let runtime = runtime(CaptureConfig::new().with_output_root("/out")).unwrap();
        let spec = runtime.device_spec(&ChunkKey::new("d", "c"));
        assert_eq!(spec.output_dir, std::path::PathBuf::from("/out/d/c"));
        assert_eq!(spec.file_pattern, "_rs_chunk_plot_%03d.png");
    }
}
