//! The graphics device seam.

use super::PlotNaming;
use crate::config::{PlotConfig, PlotFormat};
use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters for arming a graphics device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Folder the device writes into.
    pub output_dir: PathBuf,
    /// File name pattern with a `%03d` sequence slot.
    pub file_pattern: String,
    /// Width in `units`.
    pub width: f64,
    /// Height in `units`.
    pub height: f64,
    /// Units for width and height.
    pub units: String,
    /// Resolution in dots per inch.
    pub resolution: u32,
    /// Output format.
    pub format: PlotFormat,
}

impl DeviceSpec {
    /// Builds the arming parameters for `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl AsRef<Path>, naming: &PlotNaming, plots: &PlotConfig) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            file_pattern: naming.device_pattern(),
            width: plots.width,
            height: plots.height,
            units: plots.units.clone(),
            resolution: plots.resolution,
            format: plots.format,
        }
    }

    /// The full path pattern the device writes to.
    #[must_use]
    pub fn path_pattern(&self) -> PathBuf {
        self.output_dir.join(&self.file_pattern)
    }

    /// The path the device writes for sequence number `index`.
    #[must_use]
    pub fn artifact_path(&self, index: u32) -> PathBuf {
        self.output_dir
            .join(self.file_pattern.replace("%03d", &format!("{index:03}")))
    }
}

/// A graphics output device that writes numbered image files.
///
/// Both commands are synchronous. Turning the device off flushes any
/// buffered plot to disk.
#[cfg_attr(test, mockall::automock)]
pub trait GraphicsDevice: Send + Sync {
    /// Arms the device so subsequent plots are written per `spec`.
    fn arm(&self, spec: &DeviceSpec) -> Result<(), CaptureError>;

    /// Turns the device off.
    fn off(&self) -> Result<(), CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_config() {
        let naming = PlotNaming::new("_p_", "png").unwrap();
        let spec = DeviceSpec::new("/out/d/c", &naming, &PlotConfig::default());

        assert_eq!(spec.path_pattern(), PathBuf::from("/out/d/c/_p_%03d.png"));
        assert_eq!(spec.artifact_path(2), PathBuf::from("/out/d/c/_p_002.png"));
        assert_eq!(spec.resolution, 96);
        assert_eq!(spec.units, "in");
    }
}
