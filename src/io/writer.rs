//! Persistence of finished output documents.
//!
//! Outputs land in a caller-provided scratch directory under
//! collision-resistant `merge_*_pdf` names, so concurrent executions
//! against the same directory can never clobber each other. Serialization
//! is CPU- and disk-bound, so it runs on the blocking thread pool.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::Document as Pdf;
use tokio::task;

use crate::error::{Error, Result};

/// Buffer size for PDF serialization.
const WRITE_BUFFER_SIZE: usize = 8192;

/// Writes finished documents into a scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchWriter {
    scratch_dir: PathBuf,
}

impl ScratchWriter {
    /// A writer targeting `scratch_dir`. The directory must exist and be
    /// writable.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// The directory this writer persists into.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Persist `doc` to a fresh `merge_*_pdf` file, returning its path.
    ///
    /// The file is created with a unique name and kept on success; nothing
    /// is left behind if serialization fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FailedToWrite`] when the scratch directory is not
    /// writable or serialization fails.
    pub async fn persist(&self, mut doc: Pdf) -> Result<PathBuf> {
        let scratch_dir = self.scratch_dir.clone();

        task::spawn_blocking(move || {
            let write_error = |source: std::io::Error| Error::FailedToWrite {
                path: scratch_dir.clone(),
                source,
            };

            let temp = tempfile::Builder::new()
                .prefix("merge_")
                .suffix("_pdf")
                .tempfile_in(&scratch_dir)
                .map_err(write_error)?;

            let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, temp);
            doc.save_to(&mut writer)
                .map_err(|e| write_error(std::io::Error::other(e)))?;
            writer.flush().map_err(write_error)?;

            let temp = writer
                .into_inner()
                .map_err(|e| write_error(e.into_error()))?;
            let (_file, path) = temp.keep().map_err(|e| write_error(e.error))?;

            tracing::debug!("persisted output to {}", path.display());
            Ok(path)
        })
        .await
        .map_err(|e| Error::assembly(format!("write task failed: {e}")))?
    }
}
