//! The chunk execution context.

use super::CaptureRuntime;
use crate::core::{CapturePhase, ChunkKey, ConsoleStream, OutputKind, OutputRecord};
use crate::errors::CaptureError;
use crate::events::{
    chunk_event_data, ChunkConsoleOutput, ChunkExecCompleted, ChunkOutput, ConsoleOutput,
    Subscription,
};
use crate::graphics::{GraphicsCaptureSession, SessionPhase};
use crate::relocation::{merge_shared_assets, move_file};
use crate::utils::iso_timestamp;
use parking_lot::Mutex;
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Span};

#[derive(Default)]
struct ExecState {
    phase: CapturePhase,
    console_connected: bool,
    graphics_connected: bool,
    console_subs: Vec<Subscription>,
    graphics_subs: Vec<Subscription>,
    session: Option<Arc<GraphicsCaptureSession>>,
    armed_at: Option<Instant>,
}

/// Captures everything one chunk produces during a single execution.
///
/// `connect` attaches to the console and starts graphics capture. The
/// context completes when both the console has returned to the prompt and
/// the graphics session has finished, in either order, and emits
/// `chunk_exec_completed` exactly once.
///
/// Handlers never run while the internal lock is held, so any event may
/// arrive from inside another handler.
pub struct ChunkExecContext {
    key: ChunkKey,
    runtime: Arc<CaptureRuntime>,
    span: Span,
    done: watch::Sender<bool>,
    state: Mutex<ExecState>,
}

impl ChunkExecContext {
    pub(crate) fn new(runtime: Arc<CaptureRuntime>, key: ChunkKey) -> Arc<Self> {
        let span = info_span!("chunk_exec", doc_id = %key.doc_id, chunk_id = %key.chunk_id);
        let (done, _) = watch::channel(false);
        Arc::new(Self {
            key,
            runtime,
            span,
            done,
            state: Mutex::new(ExecState::default()),
        })
    }

    /// Returns the chunk key.
    #[must_use]
    pub fn key(&self) -> &ChunkKey {
        &self.key
    }

    /// Returns the document identifier.
    #[must_use]
    pub fn doc_id(&self) -> &str {
        &self.key.doc_id
    }

    /// Returns the chunk identifier.
    #[must_use]
    pub fn chunk_id(&self) -> &str {
        &self.key.chunk_id
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> CapturePhase {
        self.state.lock().phase
    }

    /// Returns true while console events are captured.
    #[must_use]
    pub fn console_connected(&self) -> bool {
        self.state.lock().console_connected
    }

    /// Returns true while the graphics session is watching.
    #[must_use]
    pub fn graphics_connected(&self) -> bool {
        self.state.lock().graphics_connected
    }

    /// Returns true once the completion event has fired.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        *self.done.borrow()
    }

    /// The chunk's output folder.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.runtime.layout().chunk_dir(&self.key)
    }

    /// Records assigned so far, in ordinal order.
    #[must_use]
    pub fn records(&self) -> Vec<OutputRecord> {
        self.runtime.ledger().records(&self.key)
    }

    /// The graphics session, once connected.
    #[must_use]
    pub fn graphics_session(&self) -> Option<Arc<GraphicsCaptureSession>> {
        self.state.lock().session.clone()
    }

    /// Resolves once the completion event has fired.
    pub async fn wait_completed(&self) {
        let mut done = self.done.subscribe();
        // the sender lives as long as self, so this only ends on completion
        let _ = done.wait_for(|completed| *completed).await;
    }

    /// Arms capture for this chunk.
    ///
    /// Fails if the output folder cannot be created, in which case nothing
    /// is attached, or if the chunk is already being captured. A graphics
    /// capture that cannot start is logged and the chunk is captured from
    /// the console alone.
    pub fn connect(self: &Arc<Self>) -> Result<(), CaptureError> {
        let _guard = self.span.enter();

        let phase = self.phase();
        if phase != CapturePhase::Idle {
            return Err(CaptureError::InvalidTransition(format!(
                "connect called while {phase}"
            )));
        }

        let dir = self.output_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            error!(path = %dir.display(), error = %e, "cannot create chunk output folder");
            return Err(CaptureError::setup(&dir, e));
        }
        self.runtime.ledger().begin_execution(&self.key)?;

        {
            let mut state = self.state.lock();
            state.phase = CapturePhase::Armed;
            state.console_connected = true;
            state.armed_at = Some(Instant::now());
        }

        let console_subs = self.subscribe_console();
        self.keep_console_subs(console_subs);

        self.start_graphics();

        let weak = Arc::downgrade(self);
        let html = self.runtime.notebook().html_output.subscribe(move |path: &PathBuf| {
            if let Some(ctx) = weak.upgrade() {
                ctx.on_rich_content(path);
            }
        });
        self.keep_console_subs(vec![html]);

        debug!("chunk capture armed");
        self.runtime.event_sink().try_emit(
            "chunk.connected",
            Some(chunk_event_data(&self.key, json!({"output_dir": dir.display().to_string()}))),
        );
        Ok(())
    }

    /// Detaches from the console.
    ///
    /// Completes the chunk if graphics capture has already finished;
    /// otherwise the context drains until it does. Called on the console
    /// prompt and safe to call again, or as a recovery step when no prompt
    /// will arrive.
    pub fn disconnect(&self) {
        let _guard = self.span.enter();

        let (subs, complete_now, session) = {
            let mut state = self.state.lock();
            if !state.console_connected {
                return;
            }
            state.console_connected = false;
            let subs = std::mem::take(&mut state.console_subs);
            if state.graphics_connected {
                state.phase = CapturePhase::Draining;
                (subs, false, None)
            } else {
                state.phase = CapturePhase::Completed;
                (subs, true, state.session.clone())
            }
        };
        drop(subs);

        if complete_now {
            self.complete();
            // a session still waiting on its monitor must not outlive the chunk
            if let Some(session) = session {
                if session.phase() == SessionPhase::Arming {
                    session.stop();
                }
            }
        } else {
            debug!("console detached; waiting for graphics capture");
        }
    }

    /// Records an artifact discovered by a capture source.
    ///
    /// The artifact is moved to its canonical path; an auxiliary `lib`
    /// folder beside it is merged into the document's shared folder. The
    /// ordinal is consumed even if the move fails.
    pub fn on_file_output(&self, path: &Path, kind: OutputKind) {
        let _guard = self.span.enter();

        if !self.phase().is_capturing() {
            warn!(path = %path.display(), kind = %kind, "output arrived outside capture; ignored");
            return;
        }
        let record = match self.runtime.ledger().assign_next(&self.key, kind) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "output arrived after completion; ignored");
                return;
            }
        };

        let layout = self.runtime.layout();
        let target = layout.artifact_path(&self.key, &record);
        if let Err(e) = move_file(path, &target) {
            error!(ordinal = record.ordinal, error = %e, "failed to relocate artifact");
            return;
        }

        if let Some(parent) = path.parent() {
            let assets = parent.join(layout.lib_dir_name());
            if assets.is_dir() {
                let report = merge_shared_assets(&assets, &layout.shared_lib_dir(&self.key.doc_id));
                for failure in report.failures() {
                    error!(error = %failure, "failed to merge shared asset");
                }
            }
        }

        let output = ChunkOutput {
            key: self.key.clone(),
            record,
            path: target.clone(),
            emitted_at: iso_timestamp(),
        };
        let notebook = self.runtime.notebook();
        if kind == OutputKind::Plot {
            notebook.plot_output.emit(&target);
        }
        notebook.chunk_output.emit(&output);
        self.runtime.event_sink().try_emit(
            "chunk.output",
            Some(chunk_event_data(
                &self.key,
                json!({"ordinal": record.ordinal, "kind": kind, "path": target.display().to_string()}),
            )),
        );
    }

    /// Records a rich-content fragment announced on `html_output`.
    ///
    /// Only fragments written inside this chunk's output folder belong to
    /// it; fragments of other chunks are left for their own contexts.
    pub fn on_rich_content(&self, path: &Path) {
        if !path.starts_with(self.output_dir()) {
            debug!(path = %path.display(), "fragment belongs to another chunk; ignored");
            return;
        }
        self.on_file_output(path, OutputKind::RichContent);
    }

    /// Records console text.
    ///
    /// Empty text is ignored. Listeners are notified even when the text
    /// cannot be written to the console log.
    pub fn on_console_text(&self, kind: OutputKind, text: &str, truncate: bool) {
        let _guard = self.span.enter();

        if text.is_empty() {
            return;
        }
        if !self.phase().is_capturing() {
            warn!(kind = %kind, "console text arrived outside capture; ignored");
            return;
        }
        let record = match self.runtime.ledger().assign_next(&self.key, kind) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "console text arrived after completion; ignored");
                return;
            }
        };

        if let Err(e) = self
            .runtime
            .ledger()
            .append_text(&self.key, kind, text, truncate)
        {
            error!(ordinal = record.ordinal, error = %e, "failed to persist console text");
        }

        self.runtime
            .notebook()
            .chunk_console_output
            .emit(&ChunkConsoleOutput {
                key: self.key.clone(),
                ordinal: record.ordinal,
                kind,
                text: text.to_string(),
            });
    }

    // A prompt may already have disconnected the console on another thread.
    fn keep_console_subs(&self, subs: Vec<Subscription>) {
        let mut state = self.state.lock();
        if state.console_connected {
            state.console_subs.extend(subs);
        } else {
            drop(state);
            drop(subs);
        }
    }

    fn subscribe_console(self: &Arc<Self>) -> Vec<Subscription> {
        let console = self.runtime.console();

        let weak = Arc::downgrade(self);
        let prompt = console.prompt.subscribe(move |_| {
            if let Some(ctx) = weak.upgrade() {
                ctx.on_console_prompt();
            }
        });

        let weak = Arc::downgrade(self);
        let output = console.output.subscribe(move |out: &ConsoleOutput| {
            if let Some(ctx) = weak.upgrade() {
                let kind = match out.stream {
                    ConsoleStream::Normal => OutputKind::ConsoleOutput,
                    ConsoleStream::Error => OutputKind::ConsoleError,
                };
                ctx.on_console_text(kind, &out.text, false);
            }
        });

        let weak = Arc::downgrade(self);
        let input = console.input.subscribe(move |text: &String| {
            if let Some(ctx) = weak.upgrade() {
                ctx.on_console_text(OutputKind::ConsoleInput, text, false);
            }
        });

        vec![prompt, output, input]
    }

    fn start_graphics(self: &Arc<Self>) {
        let session = GraphicsCaptureSession::new(
            self.runtime.device_spec(&self.key),
            self.runtime.naming().clone(),
            self.runtime.device().clone(),
            self.runtime.monitor().clone(),
            self.runtime.console().clone(),
        );

        let subs = vec![
            session.activated().subscribe(with_context::<(), _>(self, |ctx, _| {
                ctx.on_graphics_activated();
            })),
            session.artifacts().subscribe(with_context::<PathBuf, _>(self, |ctx, path| {
                ctx.on_file_output(path, OutputKind::Plot);
            })),
            session.completed().subscribe(with_context::<(), _>(self, |ctx, _| {
                ctx.on_graphics_complete();
            })),
        ];
        {
            let mut state = self.state.lock();
            state.graphics_subs = subs;
            state.session = Some(session.clone());
        }

        if let Err(e) = session.begin_capture() {
            warn!(error = %e, "graphics capture unavailable; capturing console output only");
            self.runtime.event_sink().try_emit(
                "chunk.capture_degraded",
                Some(chunk_event_data(&self.key, json!(e.to_dict()))),
            );
        }
    }

    fn on_console_prompt(&self) {
        if self.console_connected() {
            self.disconnect();
        }
    }

    fn on_graphics_activated(&self) {
        let mut state = self.state.lock();
        if state.phase == CapturePhase::Armed {
            state.graphics_connected = true;
        }
    }

    fn on_graphics_complete(&self) {
        let _guard = self.span.enter();

        let (subs, complete_now) = {
            let mut state = self.state.lock();
            state.graphics_connected = false;
            let subs = std::mem::take(&mut state.graphics_subs);
            let complete_now = !state.console_connected
                && !state.phase.is_terminal()
                && state.phase != CapturePhase::Idle;
            if complete_now {
                state.phase = CapturePhase::Completed;
            }
            (subs, complete_now)
        };
        drop(subs);

        self.runtime
            .notebook()
            .plot_output_complete
            .emit(&self.key);

        if complete_now {
            self.complete();
        }
    }

    fn complete(&self) {
        let records = self.runtime.ledger().seal(&self.key);
        let (graphics_subs, armed_at) = {
            let mut state = self.state.lock();
            (std::mem::take(&mut state.graphics_subs), state.armed_at.take())
        };
        drop(graphics_subs);
        let duration_ms = armed_at.map_or(0.0, |at| at.elapsed().as_secs_f64() * 1000.0);

        let session_context_id = self.runtime.config().session_context_id.clone();
        self.runtime
            .notebook()
            .chunk_exec_completed
            .emit(&ChunkExecCompleted {
                key: self.key.clone(),
                session_context_id: session_context_id.clone(),
                outputs: records.len(),
                completed_at: iso_timestamp(),
            });
        self.runtime.event_sink().try_emit(
            "chunk.completed",
            Some(chunk_event_data(
                &self.key,
                json!({
                    "outputs": records.len(),
                    "session_context_id": session_context_id,
                    "duration_ms": duration_ms,
                }),
            )),
        );
        self.done.send_replace(true);
        info!(outputs = records.len(), duration_ms, "chunk execution captured");
    }
}

impl Drop for ChunkExecContext {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.phase.is_capturing() {
            self.runtime.ledger().release(&self.key);
        }
    }
}

impl fmt::Debug for ChunkExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkExecContext")
            .field("key", &self.key)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

fn with_context<T, F>(ctx: &Arc<ChunkExecContext>, f: F) -> impl Fn(&T) + Send + Sync + 'static
where
    T: 'static,
    F: Fn(&ChunkExecContext, &T) + Send + Sync + 'static,
{
    let weak: Weak<ChunkExecContext> = Arc::downgrade(ctx);
    move |value: &T| {
        if let Some(ctx) = weak.upgrade() {
            f(&ctx, value);
        }
    }
}
