//! Test doubles for the device and monitor seams.

use crate::errors::CaptureError;
use crate::graphics::{DeviceSpec, GraphicsDevice};
use crate::monitor::{
    FileChangeEvent, FileFilter, FileInfo, FileMonitor, MonitorCallbacks, MonitorHandle,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

struct Registration {
    handle: MonitorHandle,
    root: PathBuf,
    recursive: bool,
    filter: FileFilter,
    callbacks: MonitorCallbacks,
    unregister_requested: bool,
}

/// A file monitor driven entirely by the test.
///
/// Registrations stay pending until the test completes or fails them.
/// Unregistering acknowledges immediately unless deferred, in which case
/// the test calls `finish_unregister`. Callbacks never run while the
/// monitor's lock is held.
#[derive(Default)]
pub struct ManualFileMonitor {
    registrations: Mutex<Vec<Registration>>,
    registered_total: Mutex<usize>,
    deferred_unregister: Mutex<bool>,
}

impl ManualFileMonitor {
    /// Creates a monitor with synchronous unregistration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `unregister_monitor` wait for `finish_unregister`.
    pub fn set_deferred_unregister(&self, deferred: bool) {
        *self.deferred_unregister.lock() = deferred;
    }

    /// Number of `register_monitor` calls so far.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        *self.registered_total.lock()
    }

    /// Number of registrations not yet torn down.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registrations.lock().len()
    }

    /// The most recent live registration.
    #[must_use]
    pub fn last_handle(&self) -> Option<MonitorHandle> {
        self.registrations.lock().last().map(|r| r.handle.clone())
    }

    /// The root folder of a live registration.
    #[must_use]
    pub fn root_of(&self, handle: &MonitorHandle) -> Option<PathBuf> {
        self.find(handle, |r| r.root.clone())
    }

    /// Returns true once unregistration was requested for `handle`.
    #[must_use]
    pub fn unregister_requested(&self, handle: &MonitorHandle) -> bool {
        self.find(handle, |r| r.unregister_requested).unwrap_or(false)
    }

    /// Reports a successful registration with `listing`, filtered as a real
    /// monitor would.
    pub fn complete_registration(&self, handle: &MonitorHandle, listing: &[FileInfo]) {
        let Some((filter, callbacks)) = self.find(handle, |r| (r.filter.clone(), r.callbacks.clone()))
        else {
            return;
        };
        let listing: Vec<FileInfo> = listing.iter().filter(|&info| filter(info)).cloned().collect();
        (callbacks.on_registered)(handle, &listing);
    }

    /// Reports a successful registration listing the root from disk.
    pub fn complete_registration_from_disk(&self, handle: &MonitorHandle) {
        let Some((root, recursive)) = self.find(handle, |r| (r.root.clone(), r.recursive)) else {
            return;
        };
        let listing = scan(&root, recursive);
        self.complete_registration(handle, &listing);
    }

    /// Reports a registration failure and forgets the registration.
    pub fn fail_registration(&self, handle: &MonitorHandle, error: CaptureError) {
        if let Some(registration) = self.remove(handle) {
            (registration.callbacks.on_registration_error)(&error);
        }
    }

    /// Delivers change events that pass the registration's filter.
    pub fn emit_changes(&self, handle: &MonitorHandle, events: &[FileChangeEvent]) {
        let Some((filter, callbacks)) = self.find(handle, |r| (r.filter.clone(), r.callbacks.clone()))
        else {
            return;
        };
        let events: Vec<FileChangeEvent> = events.iter().filter(|e| filter(&e.file)).cloned().collect();
        if !events.is_empty() {
            (callbacks.on_files_changed)(&events);
        }
    }

    /// Completes a deferred unregistration.
    pub fn finish_unregister(&self, handle: &MonitorHandle) {
        if let Some(registration) = self.remove(handle) {
            (registration.callbacks.on_unregistered)(handle);
        }
    }

    fn find<T>(&self, handle: &MonitorHandle, f: impl FnOnce(&Registration) -> T) -> Option<T> {
        self.registrations
            .lock()
            .iter()
            .find(|r| &r.handle == handle)
            .map(f)
    }

    fn remove(&self, handle: &MonitorHandle) -> Option<Registration> {
        let mut registrations = self.registrations.lock();
        let index = registrations.iter().position(|r| &r.handle == handle)?;
        Some(registrations.remove(index))
    }
}

impl FileMonitor for ManualFileMonitor {
    fn register_monitor(
        &self,
        root: &Path,
        recursive: bool,
        filter: FileFilter,
        callbacks: MonitorCallbacks,
    ) -> MonitorHandle {
        let handle = MonitorHandle::new();
        self.registrations.lock().push(Registration {
            handle: handle.clone(),
            root: root.to_path_buf(),
            recursive,
            filter,
            callbacks,
            unregister_requested: false,
        });
        *self.registered_total.lock() += 1;
        handle
    }

    fn unregister_monitor(&self, handle: &MonitorHandle) {
        if *self.deferred_unregister.lock() {
            if let Some(r) = self.registrations.lock().iter_mut().find(|r| &r.handle == handle) {
                r.unregister_requested = true;
            }
            return;
        }
        self.finish_unregister(handle);
    }
}

impl std::fmt::Debug for ManualFileMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualFileMonitor")
            .field("active", &self.active_count())
            .field("registered_total", &self.registration_count())
            .finish()
    }
}

fn scan(root: &Path, recursive: bool) -> Vec<FileInfo> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| FileInfo {
            path: entry.path().to_path_buf(),
            is_dir: entry.file_type().is_dir(),
        })
        .collect()
}

/// A graphics device that records calls.
///
/// It can refuse to arm, and can write a plot into the armed folder when
/// turned off, the way devices that buffer their last page do.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    arm_failure: Option<String>,
    flush_on_off: Option<u32>,
    arms: Mutex<usize>,
    offs: Mutex<usize>,
    armed: Mutex<Option<DeviceSpec>>,
    last_spec: Mutex<Option<DeviceSpec>>,
}

impl RecordingDevice {
    /// Creates a device that arms and turns off successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `arm` fail with `message`.
    #[must_use]
    pub fn with_arm_failure(mut self, message: impl Into<String>) -> Self {
        self.arm_failure = Some(message.into());
        self
    }

    /// Makes `off` write plot number `index` into the armed folder.
    #[must_use]
    pub fn with_flush_on_off(mut self, index: u32) -> Self {
        self.flush_on_off = Some(index);
        self
    }

    /// Number of `arm` calls.
    #[must_use]
    pub fn arm_count(&self) -> usize {
        *self.arms.lock()
    }

    /// Number of `off` calls.
    #[must_use]
    pub fn off_count(&self) -> usize {
        *self.offs.lock()
    }

    /// The parameters of the last `arm` call.
    #[must_use]
    pub fn last_spec(&self) -> Option<DeviceSpec> {
        self.last_spec.lock().clone()
    }

    /// Writes plot number `index` as the armed device would.
    pub fn draw(&self, index: u32) -> Result<PathBuf, CaptureError> {
        let path = self
            .armed
            .lock()
            .as_ref()
            .map(|spec| spec.artifact_path(index))
            .ok_or_else(|| CaptureError::device("device is not armed"))?;
        std::fs::write(&path, b"\x89PNG")?;
        Ok(path)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn arm(&self, spec: &DeviceSpec) -> Result<(), CaptureError> {
        *self.arms.lock() += 1;
        *self.last_spec.lock() = Some(spec.clone());
        if let Some(message) = &self.arm_failure {
            return Err(CaptureError::device(message.clone()));
        }
        *self.armed.lock() = Some(spec.clone());
        Ok(())
    }

    fn off(&self) -> Result<(), CaptureError> {
        *self.offs.lock() += 1;
        if let Some(index) = self.flush_on_off {
            if self.armed.lock().is_some() {
                self.draw(index)?;
            }
        }
        *self.armed.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::graphics::PlotNaming;
    use std::sync::Arc;

    #[test]
    fn test_recording_device_flushes_on_off() {
        let dir = tempfile::tempdir().unwrap();
        let naming = PlotNaming::new("_p_", "png").unwrap();
        let spec = DeviceSpec::new(dir.path(), &naming, &PlotConfig::default());
        let device = RecordingDevice::new().with_flush_on_off(4);

        device.arm(&spec).unwrap();
        device.off().unwrap();
        device.off().unwrap();

        assert!(dir.path().join("_p_004.png").exists());
        assert_eq!(device.arm_count(), 1);
        assert_eq!(device.off_count(), 2);
        assert!(device.draw(5).is_err());
    }

    #[test]
    fn test_manual_monitor_filters_listing() {
        let monitor = ManualFileMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callbacks = MonitorCallbacks::noop().with_registered(move |_, listing| {
            sink.lock().extend(listing.iter().cloned());
        });
        let filter: FileFilter = Arc::new(|info: &FileInfo| info.is_dir);

        let handle = monitor.register_monitor(Path::new("/w"), true, filter, callbacks);
        monitor.complete_registration(&handle, &[FileInfo::file("/w/a"), FileInfo::dir("/w/d")]);

        assert_eq!(*seen.lock(), vec![FileInfo::dir("/w/d")]);
    }

    #[test]
    fn test_manual_monitor_deferred_unregister() {
        let monitor = ManualFileMonitor::new();
        monitor.set_deferred_unregister(true);
        let count = Arc::new(Mutex::new(0));
        let hits = count.clone();
        let callbacks = MonitorCallbacks::noop().with_unregistered(move |_| *hits.lock() += 1);

        let handle = monitor.register_monitor(Path::new("/w"), true, Arc::new(|_: &FileInfo| true), callbacks);
        monitor.unregister_monitor(&handle);
        assert!(monitor.unregister_requested(&handle));
        assert_eq!(*count.lock(), 0);

        monitor.finish_unregister(&handle);
        monitor.finish_unregister(&handle);
        assert_eq!(*count.lock(), 1);
        assert_eq!(monitor.active_count(), 0);
    }
}
