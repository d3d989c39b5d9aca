//! Output file handling.
//!
//! The output is a single growing elementary stream. It is removed once at
//! startup and only ever appended to afterwards; each recording run adds one
//! chunk at the end.

use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Remove any stale output so the session starts from an empty append target.
///
/// A missing file is fine. Any other failure is fatal.
pub fn prepare_output(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed previous output {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow!(
            "failed to remove previous output {}: {}",
            path.display(),
            e
        )),
    }
}

/// Append-only writer for one recording run.
pub struct RecordingSink {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl RecordingSink {
    /// Open `path` for appending, creating it if needed. Never truncates.
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open output {} for append", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer
            .write_all(chunk)
            .with_context(|| format!("append to output {}", self.path.display()))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Flush buffered data and release the handle. The file stays on disk.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("flush output {}", self.path.display()))?;
        Ok(self.bytes_written)
    }
}

impl std::fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSink")
            .field("path", &self.path)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}
