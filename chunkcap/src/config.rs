//! Configuration types for chunk output capture.

use crate::errors::CaptureError;
use crate::graphics::PlotNaming;
use crate::layout::OutputLayout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Root directory under which per-document output trees are written.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Graphics device parameters.
    #[serde(default)]
    pub plots: PlotConfig,
    /// Name of the auxiliary asset folder accompanying rich content, and of
    /// the document-wide shared folder those assets are merged into.
    #[serde(default = "default_lib_dir_name")]
    pub lib_dir_name: String,
    /// File name of the per-chunk console log.
    #[serde(default = "default_console_log_name")]
    pub console_log_name: String,
    /// File name of the per-chunk output manifest written on completion.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
    /// Poll interval for the polling file monitor, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Identifier of the interpreter session, reported on chunk completion.
    #[serde(default = "default_session_context_id")]
    pub session_context_id: String,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_output_root() -> PathBuf {
    std::env::temp_dir().join("chunkcap")
}

fn default_lib_dir_name() -> String {
    "lib".to_string()
}

fn default_console_log_name() -> String {
    "console.jsonl".to_string()
}

fn default_manifest_name() -> String {
    "manifest.json".to_string()
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_session_context_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            plots: PlotConfig::default(),
            lib_dir_name: default_lib_dir_name(),
            console_log_name: default_console_log_name(),
            manifest_name: default_manifest_name(),
            poll_interval_ms: default_poll_interval_ms(),
            session_context_id: default_session_context_id(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Sets the output root.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Sets the plot configuration.
    #[must_use]
    pub fn with_plots(mut self, plots: PlotConfig) -> Self {
        self.plots = plots;
        self
    }

    /// Sets the session context identifier.
    #[must_use]
    pub fn with_session_context_id(mut self, id: impl Into<String>) -> Self {
        self.session_context_id = id.into();
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, millis: u64) -> Self {
        self.poll_interval_ms = millis;
        self
    }

    /// Gets the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Builds the output layout described by this configuration.
    #[must_use]
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_root)
            .with_lib_dir_name(&self.lib_dir_name)
            .with_console_log_name(&self.console_log_name)
            .with_manifest_name(&self.manifest_name)
            .with_plot_extension(self.plots.format.extension())
    }

    /// Builds the plot naming convention described by this configuration.
    #[must_use]
    pub fn plot_naming(&self) -> Result<PlotNaming, CaptureError> {
        PlotNaming::new(&self.plots.file_prefix, self.plots.format.extension())
    }

    /// Checks the configuration for values capture cannot work with.
    pub fn validate(&self) -> Result<(), CaptureError> {
        for (field, value) in [
            ("lib_dir_name", &self.lib_dir_name),
            ("console_log_name", &self.console_log_name),
            ("manifest_name", &self.manifest_name),
            ("plots.file_prefix", &self.plots.file_prefix),
        ] {
            if value.is_empty() {
                return Err(CaptureError::Config(format!("{field} must not be empty")));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(CaptureError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.plots.width <= 0.0 || self.plots.height <= 0.0 {
            return Err(CaptureError::Config(
                "plot dimensions must be positive".to_string(),
            ));
        }
        if self.plots.resolution == 0 {
            return Err(CaptureError::Config(
                "plot resolution must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Image format written by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotFormat {
    /// Portable Network Graphics.
    Png,
    /// Scalable Vector Graphics.
    Svg,
}

impl Default for PlotFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl PlotFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

impl fmt::Display for PlotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Graphics device parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// File name prefix marking a file as a captured plot.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Output format.
    #[serde(default)]
    pub format: PlotFormat,
    /// Width in `units`.
    #[serde(default = "default_plot_size")]
    pub width: f64,
    /// Height in `units`.
    #[serde(default = "default_plot_size")]
    pub height: f64,
    /// Units for width and height.
    #[serde(default = "default_units")]
    pub units: String,
    /// Resolution in dots per inch.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
}

fn default_file_prefix() -> String {
    "_rs_chunk_plot_".to_string()
}

fn default_plot_size() -> f64 {
    7.0
}

fn default_units() -> String {
    "in".to_string()
}

fn default_resolution() -> u32 {
    96
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            format: PlotFormat::default(),
            width: default_plot_size(),
            height: default_plot_size(),
            units: default_units(),
            resolution: default_resolution(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"chunkcap=debug"`.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON formatted records.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}
