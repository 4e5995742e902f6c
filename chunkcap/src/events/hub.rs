//! Event surfaces shared between the interpreter, capture and listeners.

use super::Signal;
use crate::core::{ChunkKey, ConsoleStream, OutputKind, OutputRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Text the console wrote to one of its streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleOutput {
    /// Which stream the text went to.
    pub stream: ConsoleStream,
    /// The text.
    pub text: String,
}

/// Signals raised by the interpreter console.
#[derive(Debug, Clone)]
pub struct ConsoleEvents {
    /// The console returned to the top-level prompt. Carries the prompt text.
    pub prompt: Signal<String>,
    /// The console wrote output.
    pub output: Signal<ConsoleOutput>,
    /// The console echoed input.
    pub input: Signal<String>,
}

impl Default for ConsoleEvents {
    fn default() -> Self {
        Self {
            prompt: Signal::new("console.prompt"),
            output: Signal::new("console.output"),
            input: Signal::new("console.input"),
        }
    }
}

impl ConsoleEvents {
    /// Creates an unsubscribed set of console signals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a prompt event.
    pub fn emit_prompt(&self, prompt: &str) {
        self.prompt.emit(&prompt.to_string());
    }

    /// Emits an output event.
    pub fn emit_output(&self, stream: ConsoleStream, text: &str) {
        self.output.emit(&ConsoleOutput {
            stream,
            text: text.to_string(),
        });
    }

    /// Emits an input event.
    pub fn emit_input(&self, text: &str) {
        self.input.emit(&text.to_string());
    }
}

/// A relocated artifact or recorded console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutput {
    /// The chunk that produced the output.
    pub key: ChunkKey,
    /// The ledger record.
    pub record: OutputRecord,
    /// Canonical location of the output.
    pub path: PathBuf,
    /// When the output was recorded (ISO 8601).
    pub emitted_at: String,
}

/// Console text attributed to a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConsoleOutput {
    /// The chunk that produced the text.
    pub key: ChunkKey,
    /// The text's ordinal.
    pub ordinal: u64,
    /// Console kind.
    pub kind: OutputKind,
    /// The text.
    pub text: String,
}

/// The terminal event of a chunk execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkExecCompleted {
    /// The chunk that finished.
    pub key: ChunkKey,
    /// Identifier of the interpreter session that ran it.
    pub session_context_id: String,
    /// Number of records in the sealed ledger.
    pub outputs: usize,
    /// When the chunk completed (ISO 8601).
    pub completed_at: String,
}

/// Signals shared with rich-content producers and external listeners.
#[derive(Debug, Clone)]
pub struct NotebookEvents {
    /// A rich-content fragment was written. Producers write fragments into
    /// the chunk's output folder and emit here; the armed context owning
    /// that folder relocates it.
    pub html_output: Signal<PathBuf>,
    /// A plot was relocated to its canonical path.
    pub plot_output: Signal<PathBuf>,
    /// A chunk's graphics capture finished.
    pub plot_output_complete: Signal<ChunkKey>,
    /// Any output was recorded for a chunk.
    pub chunk_output: Signal<ChunkOutput>,
    /// Console text was recorded for a chunk.
    pub chunk_console_output: Signal<ChunkConsoleOutput>,
    /// A chunk finished executing and all of its output was captured.
    pub chunk_exec_completed: Signal<ChunkExecCompleted>,
}

impl Default for NotebookEvents {
    fn default() -> Self {
        Self {
            html_output: Signal::new("notebook.html_output"),
            plot_output: Signal::new("notebook.plot_output"),
            plot_output_complete: Signal::new("notebook.plot_output_complete"),
            chunk_output: Signal::new("notebook.chunk_output"),
            chunk_console_output: Signal::new("notebook.chunk_console_output"),
            chunk_exec_completed: Signal::new("notebook.chunk_exec_completed"),
        }
    }
}

impl NotebookEvents {
    /// Creates an unsubscribed set of notebook signals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
