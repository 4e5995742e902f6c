//! Output kind enum shared by the ledger, layout and listeners.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of output a chunk produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Text written to the console's normal stream.
    ConsoleOutput,
    /// Text written to the console's error stream.
    ConsoleError,
    /// Input echoed by the console.
    ConsoleInput,
    /// A rendered graphics file.
    Plot,
    /// A rendered rich-content (HTML) fragment.
    RichContent,
}

impl OutputKind {
    /// Returns the numeric code written into console log line records.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::ConsoleOutput => 0,
            Self::ConsoleError => 1,
            Self::ConsoleInput => 2,
            Self::Plot => 3,
            Self::RichContent => 4,
        }
    }

    /// Parses a numeric line-record code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::ConsoleOutput),
            1 => Some(Self::ConsoleError),
            2 => Some(Self::ConsoleInput),
            3 => Some(Self::Plot),
            4 => Some(Self::RichContent),
            _ => None,
        }
    }

    /// Returns true for the kinds persisted in the console log rather than
    /// as standalone artifact files.
    #[must_use]
    pub fn is_console(self) -> bool {
        matches!(
            self,
            Self::ConsoleOutput | Self::ConsoleError | Self::ConsoleInput
        )
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsoleOutput => write!(f, "console_output"),
            Self::ConsoleError => write!(f, "console_error"),
            Self::ConsoleInput => write!(f, "console_input"),
            Self::Plot => write!(f, "plot"),
            Self::RichContent => write!(f, "rich_content"),
        }
    }
}

/// The console stream a piece of output text was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleStream {
    /// Regular output.
    Normal,
    /// Error output.
    Error,
}

impl ConsoleStream {
    /// Maps the stream onto the ledger kind it is recorded as.
    #[must_use]
    pub fn output_kind(self) -> OutputKind {
        match self {
            Self::Normal => OutputKind::ConsoleOutput,
            Self::Error => OutputKind::ConsoleError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_covers_all_kinds() {
        for kind in [
            OutputKind::ConsoleOutput,
            OutputKind::ConsoleError,
            OutputKind::ConsoleInput,
            OutputKind::Plot,
            OutputKind::RichContent,
        ] {
            assert_eq!(OutputKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(OutputKind::from_code(42), None);
    }

    #[test]
    fn test_console_kinds() {
        assert!(OutputKind::ConsoleInput.is_console());
        assert!(!OutputKind::Plot.is_console());
        assert!(!OutputKind::RichContent.is_console());
    }

    #[test]
    fn test_stream_mapping() {
        assert_eq!(ConsoleStream::Normal.output_kind(), OutputKind::ConsoleOutput);
        assert_eq!(ConsoleStream::Error.output_kind(), OutputKind::ConsoleError);
    }

    #[test]
    fn test_display() {
        assert_eq!(OutputKind::RichContent.to_string(), "rich_content");
    }
}
