//! A polling file monitor driven by the tokio runtime.

use super::{
    FileChangeEvent, FileChangeKind, FileFilter, FileInfo, FileMonitor, MonitorCallbacks,
    MonitorHandle,
};
use crate::config::CaptureConfig;
use crate::errors::CaptureError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    is_dir: bool,
    len: u64,
    modified: Option<SystemTime>,
}

type Snapshot = HashMap<PathBuf, Fingerprint>;

/// Watches folders by rescanning them on a fixed interval.
///
/// Each registration runs in its own task on the current tokio runtime.
#[derive(Debug)]
pub struct PollingFileMonitor {
    interval: Duration,
    watches: Arc<DashMap<MonitorHandle, oneshot::Sender<()>>>,
}

impl PollingFileMonitor {
    /// Creates a monitor that rescans every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            watches: Arc::new(DashMap::new()),
        }
    }

    /// Creates a monitor using the configured poll interval.
    #[must_use]
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.poll_interval())
    }

    /// Returns the rescan interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the number of live registrations.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }
}

impl Default for PollingFileMonitor {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl FileMonitor for PollingFileMonitor {
    fn register_monitor(
        &self,
        root: &Path,
        recursive: bool,
        filter: FileFilter,
        callbacks: MonitorCallbacks,
    ) -> MonitorHandle {
        let handle = MonitorHandle::new();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                (callbacks.on_registration_error)(&CaptureError::monitor(
                    root,
                    format!("no async runtime available: {e}"),
                ));
                return handle;
            }
        };

        if !root.is_dir() {
            (callbacks.on_registration_error)(&CaptureError::monitor(root, "not a directory"));
            return handle;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        self.watches.insert(handle.clone(), stop_tx);

        let watch = Watch {
            root: root.to_path_buf(),
            recursive,
            filter,
            callbacks,
            handle: handle.clone(),
            interval: self.interval,
        };
        let watches = self.watches.clone();
        runtime.spawn(async move {
            let handle = watch.handle.clone();
            watch.run(stop_rx).await;
            watches.remove(&handle);
        });

        debug!(handle = %handle, root = %root.display(), "polling monitor registered");
        handle
    }

    fn unregister_monitor(&self, handle: &MonitorHandle) {
        match self.watches.remove(handle) {
            Some((_, stop)) => {
                let _ = stop.send(());
            }
            None => debug!(handle = %handle, "unregister for unknown monitor"),
        }
    }
}

struct Watch {
    root: PathBuf,
    recursive: bool,
    filter: FileFilter,
    callbacks: MonitorCallbacks,
    handle: MonitorHandle,
    interval: Duration,
}

impl Watch {
    async fn run(self, mut stop: oneshot::Receiver<()>) {
        let mut known = self.scan();
        let listing: Vec<FileInfo> = sorted_infos(&known);
        (self.callbacks.on_registered)(&self.handle, &listing);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    let current = self.scan();
                    let changes = diff(&known, &current);
                    known = current;
                    if !changes.is_empty() {
                        (self.callbacks.on_files_changed)(&changes);
                    }
                }
            }
        }

        (self.callbacks.on_unregistered)(&self.handle);
    }

    fn scan(&self) -> Snapshot {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let filter = &self.filter;
        let mut snapshot = Snapshot::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| {
                filter(&FileInfo {
                    path: entry.path().to_path_buf(),
                    is_dir: entry.file_type().is_dir(),
                })
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let metadata = entry.metadata().ok();
            snapshot.insert(
                entry.path().to_path_buf(),
                Fingerprint {
                    is_dir: entry.file_type().is_dir(),
                    len: metadata.as_ref().map_or(0, std::fs::Metadata::len),
                    modified: metadata.and_then(|m| m.modified().ok()),
                },
            );
        }

        snapshot
    }
}

fn sorted_infos(snapshot: &Snapshot) -> Vec<FileInfo> {
    let mut infos: Vec<FileInfo> = snapshot
        .iter()
        .map(|(path, print)| FileInfo {
            path: path.clone(),
            is_dir: print.is_dir,
        })
        .collect();
    infos.sort_by(|a, b| a.path.cmp(&b.path));
    infos
}

fn diff(before: &Snapshot, after: &Snapshot) -> Vec<FileChangeEvent> {
    let mut changes = Vec::new();

    for (path, print) in after {
        let info = FileInfo {
            path: path.clone(),
            is_dir: print.is_dir,
        };
        match before.get(path) {
            None => changes.push(FileChangeEvent::new(FileChangeKind::Added, info)),
            Some(old) if old != print => {
                changes.push(FileChangeEvent::new(FileChangeKind::Modified, info));
            }
            Some(_) => {}
        }
    }
    for (path, print) in before {
        if !after.contains_key(path) {
            changes.push(FileChangeEvent::new(
                FileChangeKind::Removed,
                FileInfo {
                    path: path.clone(),
                    is_dir: print.is_dir,
                },
            ));
        }
    }

    changes.sort_by(|a, b| a.file.path.cmp(&b.file.path));
    changes
}
