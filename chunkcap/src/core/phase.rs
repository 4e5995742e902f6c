//! Lifecycle phase of an execution context.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle phase of a chunk execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    /// Created but not yet connected.
    Idle,
    /// Connected and capturing console and graphics output.
    Armed,
    /// The console has returned to the prompt; graphics are still flushing.
    Draining,
    /// Both sources have finished and the completion event has fired.
    Completed,
}

impl Default for CapturePhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Armed => write!(f, "armed"),
            Self::Draining => write!(f, "draining"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl CapturePhase {
    /// Returns true once the context can no longer change phase.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true while console or graphics output may still arrive.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Armed | Self::Draining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(CapturePhase::default(), CapturePhase::Idle);
    }

    #[test]
    fn test_terminal_and_capturing() {
        assert!(CapturePhase::Completed.is_terminal());
        assert!(!CapturePhase::Draining.is_terminal());
        assert!(CapturePhase::Armed.is_capturing());
        assert!(CapturePhase::Draining.is_capturing());
        assert!(!CapturePhase::Idle.is_capturing());
    }

    #[test]
    fn test_display() {
        assert_eq!(CapturePhase::Draining.to_string(), "draining");
    }
}
