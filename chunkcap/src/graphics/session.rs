//! One chunk's graphics capture.

use super::{DeviceSpec, GraphicsDevice, PlotNaming};
use crate::errors::CaptureError;
use crate::events::{ConsoleEvents, Signal, Subscription};
use crate::monitor::{
    FileChangeEvent, FileChangeKind, FileFilter, FileInfo, FileMonitor, MonitorCallbacks,
    MonitorHandle,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// Where a capture session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Not started.
    #[default]
    Idle,
    /// Device armed, waiting for the monitor to register.
    Arming,
    /// Monitor active; plots are reported as they appear.
    Watching,
    /// Device off and final sweep in progress.
    TearingDown,
    /// Completion emitted.
    Finished,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Arming => write!(f, "arming"),
            Self::Watching => write!(f, "watching"),
            Self::TearingDown => write!(f, "tearing_down"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

#[derive(Default)]
struct SessionState {
    phase: SessionPhase,
    handle: Option<MonitorHandle>,
    prompt: Option<Subscription>,
    stop_requested: bool,
    delivered: HashSet<PathBuf>,
}

/// Captures the plots one chunk writes into its output folder.
///
/// The session arms the device on `begin_capture`, reports every matching
/// file through `artifacts`, and stops watching at the next console prompt.
/// Teardown turns the device off, sweeps the folder once more and emits
/// `completed` exactly once. Each path is reported at most once.
pub struct GraphicsCaptureSession {
    folder: PathBuf,
    naming: PlotNaming,
    spec: DeviceSpec,
    device: Arc<dyn GraphicsDevice>,
    monitor: Arc<dyn FileMonitor>,
    console: Arc<ConsoleEvents>,
    artifacts: Signal<PathBuf>,
    activated: Signal<()>,
    completed: Signal<()>,
    state: Mutex<SessionState>,
}

impl GraphicsCaptureSession {
    /// Creates an idle session for `spec.output_dir`.
    #[must_use]
    pub fn new(
        spec: DeviceSpec,
        naming: PlotNaming,
        device: Arc<dyn GraphicsDevice>,
        monitor: Arc<dyn FileMonitor>,
        console: Arc<ConsoleEvents>,
    ) -> Arc<Self> {
        Arc::new(Self {
            folder: spec.output_dir.clone(),
            naming,
            spec,
            device,
            monitor,
            console,
            artifacts: Signal::new("graphics.artifact"),
            activated: Signal::new("graphics.activated"),
            completed: Signal::new("graphics.completed"),
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Returns the watched folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    /// Fires with the path of each discovered plot.
    #[must_use]
    pub fn artifacts(&self) -> &Signal<PathBuf> {
        &self.artifacts
    }

    /// Fires once the monitor is watching the folder.
    #[must_use]
    pub fn activated(&self) -> &Signal<()> {
        &self.activated
    }

    /// Fires once, after teardown.
    #[must_use]
    pub fn completed(&self) -> &Signal<()> {
        &self.completed
    }

    /// Clears stale plots, arms the device and starts watching the folder.
    ///
    /// Returns an error if the folder cannot be listed or the device refuses
    /// to arm; the session is then finished without emitting anything.
    /// Monitor registration failures arrive later and tear the session down.
    pub fn begin_capture(self: &Arc<Self>) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock();
            if state.phase != SessionPhase::Idle {
                return Err(CaptureError::InvalidTransition(format!(
                    "begin_capture called while {}",
                    state.phase
                )));
            }
            state.phase = SessionPhase::Arming;
        }

        if let Err(e) = self.arm() {
            self.state.lock().phase = SessionPhase::Finished;
            return Err(e);
        }

        let handle = self.monitor.register_monitor(
            &self.folder,
            true,
            self.file_filter(),
            self.monitor_callbacks(),
        );

        let stop_now = {
            let mut state = self.state.lock();
            match state.phase {
                SessionPhase::Arming | SessionPhase::Watching => {
                    if state.handle.is_none() {
                        state.handle = Some(handle.clone());
                    }
                    state.stop_requested
                }
                _ => false,
            }
        };
        if stop_now {
            self.stop();
        }

        debug!(folder = %self.folder.display(), handle = %handle, "graphics capture armed");
        Ok(())
    }

    /// Stops watching. Teardown follows once the monitor acknowledges.
    ///
    /// Safe to call repeatedly and from a prompt handler.
    pub fn stop(&self) {
        let (prompt, handle) = {
            let mut state = self.state.lock();
            state.stop_requested = true;
            (state.prompt.take(), state.handle.take())
        };
        drop(prompt);

        if let Some(handle) = handle {
            debug!(handle = %handle, "stopping graphics monitor");
            self.monitor.unregister_monitor(&handle);
        }
    }

    fn arm(&self) -> Result<(), CaptureError> {
        let children = list_children(&self.folder)
            .map_err(|e| CaptureError::monitor(&self.folder, format!("cannot list folder: {e}")))?;

        for path in children.iter().filter(|path| self.naming.matches(path)) {
            if let Err(e) = std::fs::remove_file(path) {
                error!(path = %path.display(), error = %e, "failed to remove stale plot");
            }
        }

        self.device.arm(&self.spec)
    }

    fn file_filter(&self) -> FileFilter {
        let naming = self.naming.clone();
        Arc::new(move |info: &FileInfo| info.is_dir || naming.matches(&info.path))
    }

    // The registration owns the session until it ends; the prompt
    // subscription is owned by the session and only holds a weak link back.
    fn monitor_callbacks(self: &Arc<Self>) -> MonitorCallbacks {
        let registered = self.clone();
        let unregistered = self.clone();
        let failed = self.clone();
        let changed = self.clone();

        MonitorCallbacks::noop()
            .with_registered(move |handle, listing| registered.on_registered(handle, listing))
            .with_unregistered(move |_| unregistered.teardown())
            .with_registration_error(move |e| failed.on_registration_error(e))
            .with_files_changed(move |events| changed.on_files_changed(events))
    }

    fn on_registered(self: &Arc<Self>, handle: &MonitorHandle, listing: &[FileInfo]) {
        {
            let mut state = self.state.lock();
            if state.phase != SessionPhase::Arming || state.stop_requested {
                debug!(handle = %handle, phase = %state.phase, "ignoring late monitor registration");
                return;
            }
            state.phase = SessionPhase::Watching;
            state.handle = Some(handle.clone());
        }

        let session: Weak<Self> = Arc::downgrade(self);
        let prompt = self.console.prompt.subscribe(move |_| {
            if let Some(session) = session.upgrade() {
                session.stop();
            }
        });
        {
            let mut state = self.state.lock();
            if state.phase == SessionPhase::Watching && !state.stop_requested {
                state.prompt = Some(prompt);
            }
        }

        self.activated.emit(&());

        for info in listing {
            if !info.is_dir && self.naming.matches(&info.path) {
                self.deliver(&info.path);
            }
        }
    }

    fn on_registration_error(&self, e: &CaptureError) {
        warn!(folder = %self.folder.display(), error = %e, "graphics monitor registration failed");
        self.teardown();
    }

    fn on_files_changed(&self, events: &[FileChangeEvent]) {
        for event in events {
            if event.kind == FileChangeKind::Added
                && !event.file.is_dir
                && self.naming.matches(&event.file.path)
            {
                self.deliver(&event.file.path);
            }
        }
    }

    fn deliver(&self, path: &Path) {
        {
            let mut state = self.state.lock();
            if state.phase == SessionPhase::Finished || !state.delivered.insert(path.to_path_buf()) {
                return;
            }
        }
        self.artifacts.emit(&path.to_path_buf());
    }

    fn teardown(&self) {
        let prompt = {
            let mut state = self.state.lock();
            if matches!(state.phase, SessionPhase::TearingDown | SessionPhase::Finished) {
                return;
            }
            state.phase = SessionPhase::TearingDown;
            state.handle = None;
            state.prompt.take()
        };
        drop(prompt);

        if let Err(e) = self.device.off() {
            error!(error = %e, "failed to turn graphics device off");
        }

        match list_children(&self.folder) {
            Ok(children) => {
                for path in children.iter().filter(|path| self.naming.matches(path)) {
                    self.deliver(path);
                }
            }
            Err(e) => error!(folder = %self.folder.display(), error = %e, "final plot sweep failed"),
        }

        self.state.lock().phase = SessionPhase::Finished;
        debug!(folder = %self.folder.display(), "graphics capture complete");
        self.completed.emit(&());
    }
}

impl fmt::Debug for GraphicsCaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsCaptureSession")
            .field("folder", &self.folder)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

fn list_children(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut children = std::fs::read_dir(folder)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    children.sort();
    Ok(children)
}
