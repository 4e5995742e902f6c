//! File monitoring abstraction.
//!
//! This module provides:
//! - The `FileMonitor` trait, a callback-style folder watcher
//! - `MonitorCallbacks`, the four notifications a registration can produce
//! - `PollingFileMonitor`, a tokio-driven polling implementation

#[cfg(feature = "polling")]
mod polling;

#[cfg(feature = "polling")]
pub use polling::PollingFileMonitor;

use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// A file or directory seen by a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileInfo {
    /// Absolute path.
    pub path: PathBuf,
    /// True for directories.
    pub is_dir: bool,
}

impl FileInfo {
    /// Describes a regular file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    /// Describes a directory.
    #[must_use]
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }
}

/// How a watched entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    /// The entry appeared.
    Added,
    /// The entry disappeared.
    Removed,
    /// The entry's size or modification time changed.
    Modified,
}

/// One change reported by a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    /// What happened.
    pub kind: FileChangeKind,
    /// The affected entry.
    pub file: FileInfo,
}

impl FileChangeEvent {
    /// Creates a change event.
    #[must_use]
    pub fn new(kind: FileChangeKind, file: FileInfo) -> Self {
        Self { kind, file }
    }
}

/// Identifies one monitor registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorHandle(Uuid);

impl MonitorHandle {
    /// Creates a fresh handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MonitorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Predicate deciding which entries a registration reports.
pub type FileFilter = Arc<dyn Fn(&FileInfo) -> bool + Send + Sync>;

type RegisteredFn = Arc<dyn Fn(&MonitorHandle, &[FileInfo]) + Send + Sync>;
type UnregisteredFn = Arc<dyn Fn(&MonitorHandle) + Send + Sync>;
type RegistrationErrorFn = Arc<dyn Fn(&CaptureError) + Send + Sync>;
type FilesChangedFn = Arc<dyn Fn(&[FileChangeEvent]) + Send + Sync>;

/// Notifications produced by a registration.
///
/// Exactly one of `on_registered` or `on_registration_error` fires per
/// registration. `on_unregistered` fires once after a successful
/// registration is torn down.
#[derive(Clone)]
pub struct MonitorCallbacks {
    /// The watch is live. Carries the initial listing.
    pub on_registered: RegisteredFn,
    /// The watch has stopped.
    pub on_unregistered: UnregisteredFn,
    /// The watch could not be established.
    pub on_registration_error: RegistrationErrorFn,
    /// Entries under the root changed.
    pub on_files_changed: FilesChangedFn,
}

impl MonitorCallbacks {
    /// Creates callbacks that ignore every notification.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            on_registered: Arc::new(|_: &MonitorHandle, _: &[FileInfo]| {}),
            on_unregistered: Arc::new(|_: &MonitorHandle| {}),
            on_registration_error: Arc::new(|_: &CaptureError| {}),
            on_files_changed: Arc::new(|_: &[FileChangeEvent]| {}),
        }
    }

    /// Sets the registration callback.
    #[must_use]
    pub fn with_registered<F>(mut self, f: F) -> Self
    where
        F: Fn(&MonitorHandle, &[FileInfo]) + Send + Sync + 'static,
    {
        self.on_registered = Arc::new(f);
        self
    }

    /// Sets the unregistration callback.
    #[must_use]
    pub fn with_unregistered<F>(mut self, f: F) -> Self
    where
        F: Fn(&MonitorHandle) + Send + Sync + 'static,
    {
        self.on_unregistered = Arc::new(f);
        self
    }

    /// Sets the registration error callback.
    #[must_use]
    pub fn with_registration_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&CaptureError) + Send + Sync + 'static,
    {
        self.on_registration_error = Arc::new(f);
        self
    }

    /// Sets the change callback.
    #[must_use]
    pub fn with_files_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(&[FileChangeEvent]) + Send + Sync + 'static,
    {
        self.on_files_changed = Arc::new(f);
        self
    }
}

impl fmt::Debug for MonitorCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorCallbacks").finish_non_exhaustive()
    }
}

/// A folder watcher with callback-style notifications.
///
/// Registration is asynchronous: `register_monitor` returns a handle
/// immediately and the outcome arrives through the callbacks, possibly
/// before the call returns.
pub trait FileMonitor: Send + Sync {
    /// Starts watching `root`.
    fn register_monitor(
        &self,
        root: &Path,
        recursive: bool,
        filter: FileFilter,
        callbacks: MonitorCallbacks,
    ) -> MonitorHandle;

    /// Stops a registration. `on_unregistered` follows once the watch ends.
    fn unregister_monitor(&self, handle: &MonitorHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        assert_ne!(MonitorHandle::new(), MonitorHandle::new());
    }

    #[test]
    fn test_callbacks_builder_replaces_handlers() {
        let hit = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = hit.clone();
        let callbacks = MonitorCallbacks::noop().with_files_changed(move |events| {
            seen.lock().extend(events.iter().cloned());
        });

        (callbacks.on_files_changed)(&[FileChangeEvent::new(
            FileChangeKind::Added,
            FileInfo::file("/tmp/a.png"),
        )]);

        assert_eq!(hit.lock().len(), 1);
        assert_eq!(hit.lock()[0].kind, FileChangeKind::Added);
    }
}
