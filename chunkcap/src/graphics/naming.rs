//! Naming convention for captured plot files.

use crate::errors::CaptureError;
use regex::Regex;
use std::path::Path;

/// Recognises files written by the armed graphics device.
///
/// A plot is named `{prefix}{digits}.{extension}`; the extension is matched
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct PlotNaming {
    prefix: String,
    extension: String,
    pattern: Regex,
}

impl PlotNaming {
    /// Builds the convention for `prefix` and `extension`.
    pub fn new(prefix: &str, extension: &str) -> Result<Self, CaptureError> {
        let pattern = Regex::new(&format!(
            r"^{}\d+\.(?i:{})$",
            regex::escape(prefix),
            regex::escape(extension)
        ))
        .map_err(|e| CaptureError::Config(format!("invalid plot naming: {e}")))?;

        Ok(Self {
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            pattern,
        })
    }

    /// Returns true if `path`'s file name follows the convention.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| self.pattern.is_match(name))
    }

    /// The pattern handed to the device, with a three-digit sequence slot.
    #[must_use]
    pub fn device_pattern(&self) -> String {
        format!("{}%03d.{}", self.prefix, self.extension)
    }

    /// The file name the device writes for sequence number `index`.
    #[must_use]
    pub fn file_name(&self, index: u32) -> String {
        format!("{}{index:03}.{}", self.prefix, self.extension)
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
