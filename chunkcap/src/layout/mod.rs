//! On-disk layout of captured chunk output.
//!
//! Every path here is a pure function of the configured root and the
//! explicit identifiers passed in:
//!
//! ```text
//! <root>/<doc_id>/<chunk_id>/000001.png      artifact, ordinal 1
//! <root>/<doc_id>/<chunk_id>/console.jsonl   console log
//! <root>/<doc_id>/<chunk_id>/manifest.json   output manifest
//! <root>/<doc_id>/lib/...                    shared assets
//! ```

use crate::core::{ChunkKey, OutputKind, OutputRecord};
use crate::errors::CaptureError;
use std::path::{Path, PathBuf};

/// Extension used for relocated rich-content fragments.
pub const RICH_CONTENT_EXTENSION: &str = "html";

/// Computes canonical output locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    lib_dir_name: String,
    console_log_name: String,
    manifest_name: String,
    plot_extension: String,
}

impl OutputLayout {
    /// Creates a layout rooted at `root` with default file names.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            lib_dir_name: "lib".to_string(),
            console_log_name: "console.jsonl".to_string(),
            manifest_name: "manifest.json".to_string(),
            plot_extension: "png".to_string(),
        }
    }

    /// Sets the shared asset folder name.
    #[must_use]
    pub fn with_lib_dir_name(mut self, name: impl Into<String>) -> Self {
        self.lib_dir_name = name.into();
        self
    }

    /// Sets the console log file name.
    #[must_use]
    pub fn with_console_log_name(mut self, name: impl Into<String>) -> Self {
        self.console_log_name = name.into();
        self
    }

    /// Sets the manifest file name.
    #[must_use]
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Sets the extension given to relocated plots.
    #[must_use]
    pub fn with_plot_extension(mut self, ext: impl Into<String>) -> Self {
        self.plot_extension = ext.into();
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the shared asset folder name.
    #[must_use]
    pub fn lib_dir_name(&self) -> &str {
        &self.lib_dir_name
    }

    /// Returns the plot extension.
    #[must_use]
    pub fn plot_extension(&self) -> &str {
        &self.plot_extension
    }

    /// Returns the directory holding all output for a document.
    #[must_use]
    pub fn doc_dir(&self, doc_id: &str) -> PathBuf {
        self.root.join(doc_id)
    }

    /// Returns the directory holding one chunk's output.
    #[must_use]
    pub fn chunk_dir(&self, key: &ChunkKey) -> PathBuf {
        self.doc_dir(&key.doc_id).join(&key.chunk_id)
    }

    /// Returns the console log path for a chunk.
    #[must_use]
    pub fn console_log(&self, key: &ChunkKey) -> PathBuf {
        self.chunk_dir(key).join(&self.console_log_name)
    }

    /// Returns the manifest path for a chunk.
    #[must_use]
    pub fn manifest(&self, key: &ChunkKey) -> PathBuf {
        self.chunk_dir(key).join(&self.manifest_name)
    }

    /// Returns the document-wide shared asset folder.
    #[must_use]
    pub fn shared_lib_dir(&self, doc_id: &str) -> PathBuf {
        self.doc_dir(doc_id).join(&self.lib_dir_name)
    }

    /// Returns the canonical path of an output record.
    ///
    /// Console kinds all live in the chunk's console log; file kinds get
    /// their own ordinal-named file.
    #[must_use]
    pub fn artifact_path(&self, key: &ChunkKey, record: &OutputRecord) -> PathBuf {
        if record.kind.is_console() {
            return self.console_log(key);
        }
        let extension = if record.kind == OutputKind::Plot {
            self.plot_extension.as_str()
        } else {
            RICH_CONTENT_EXTENSION
        };
        self.chunk_dir(key)
            .join(format!("{:06}.{extension}", record.ordinal))
    }

    /// Returns true for files named like a relocated artifact (`000042.png`).
    #[must_use]
    pub fn is_artifact_file(&self, path: &Path) -> bool {
        let ordinal_stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.len() == 6 && stem.bytes().all(|b| b.is_ascii_digit()));
        let known_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.plot_extension || ext == RICH_CONTENT_EXTENSION);
        ordinal_stem && known_extension
    }

    /// Checks that a chunk key can be used to build paths under the root.
    pub fn validate_key(&self, key: &ChunkKey) -> Result<(), CaptureError> {
        validate_segment(&key.doc_id)?;
        validate_segment(&key.chunk_id)?;
        // the shared folder is a sibling of the chunk folders
        if key.chunk_id == self.lib_dir_name {
            return Err(CaptureError::InvalidIdentifier(key.chunk_id.clone()));
        }
        Ok(())
    }
}

fn validate_segment(id: &str) -> Result<(), CaptureError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.contains('\0');
    if bad {
        Err(CaptureError::InvalidIdentifier(id.to_string()))
    } else {
        Ok(())
    }
}
