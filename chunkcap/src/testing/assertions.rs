//! Assertions over captured output.

use crate::core::{OutputKind, OutputRecord};
use crate::ledger::{read_console_log, LineRecord};
use std::path::Path;

/// Asserts that records carry ordinals `0..n` in order.
pub fn assert_ordinals_contiguous(records: &[OutputRecord]) {
    let ordinals: Vec<u64> = records.iter().map(|r| r.ordinal).collect();
    let expected: Vec<u64> = (0..records.len() as u64).collect();
    assert_eq!(
        ordinals, expected,
        "Expected contiguous ordinals starting at 0, got {:?}",
        ordinals
    );
}

/// Asserts that records have the given kinds, in order.
pub fn assert_record_kinds(records: &[OutputRecord], expected: &[OutputKind]) {
    let kinds: Vec<OutputKind> = records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, expected, "Unexpected record kinds");
}

/// Asserts the exact contents of a console log.
pub fn assert_console_log(path: impl AsRef<Path>, expected: &[(OutputKind, &str)]) {
    let path = path.as_ref();
    let lines = read_console_log(path)
        .unwrap_or_else(|e| panic!("Cannot read console log {}: {e}", path.display()));
    let expected: Vec<LineRecord> = expected
        .iter()
        .map(|(kind, text)| LineRecord::new(*kind, *text))
        .collect();
    assert_eq!(lines, expected, "Unexpected console log {}", path.display());
}
