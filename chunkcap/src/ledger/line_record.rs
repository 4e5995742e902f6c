//! Console log line records.
//!
//! Each line of a console log is a JSON array `[kind_code, text]`.

use crate::core::OutputKind;
use crate::errors::CaptureError;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One line of a chunk's console log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// The console kind the text was written as.
    pub kind: OutputKind,
    /// The text, verbatim.
    pub text: String,
}

impl LineRecord {
    /// Creates a new line record.
    #[must_use]
    pub fn new(kind: OutputKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Encodes the record as a single newline-terminated line.
    pub fn encode(&self) -> Result<String, CaptureError> {
        let mut line = serde_json::to_string(&(self.kind.code(), &self.text))?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes a line produced by [`LineRecord::encode`].
    pub fn decode(line: &str) -> Result<Self, CaptureError> {
        let (code, text): (u8, String) = serde_json::from_str(line.trim_end_matches(['\r', '\n']))?;
        let kind = OutputKind::from_code(code)
            .ok_or_else(|| CaptureError::Serialization(format!("unknown kind code {code}")))?;
        Ok(Self { kind, text })
    }
}

/// Reads every record of a console log.
pub fn read_console_log(path: impl AsRef<Path>) -> Result<Vec<LineRecord>, CaptureError> {
    let file = std::fs::File::open(path.as_ref())?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        records.push(LineRecord::decode(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shape() {
        let line = LineRecord::new(OutputKind::ConsoleError, "warn").encode().unwrap();
        assert_eq!(line, "[1,\"warn\"]\n");
    }

    #[test]
    fn test_text_with_newlines_stays_on_one_line() {
        let record = LineRecord::new(OutputKind::ConsoleOutput, "a\nb,\"c\"");
        let line = record.encode().unwrap();

        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(LineRecord::decode(&line).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_unknown_code() {
        let err = LineRecord::decode("[9,\"x\"]").unwrap_err();
        assert!(err.to_string().contains("unknown kind code 9"));
    }
}
