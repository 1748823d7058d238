// File-level helpers for patch application.
//
// Source and patch are read fully into memory. Output is handed to a
// `ByteSink` exactly once, after every check has passed; `FileSink`
// writes through a uniquely named sibling temporary file and persists it
// into place so a failed run never leaves a partial output behind. The
// file sink and the SHA-256 of the output are gated behind `file-io`.

use std::fs;
use std::io;
#[cfg(feature = "file-io")]
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

#[cfg(feature = "file-io")]
use sha2::Digest;
#[cfg(feature = "file-io")]
use tempfile::NamedTempFile;

use crate::bps::decoder::{ApplyOptions, PatchDecoder};
use crate::bps::error::{DecodeError, ErrorCategory};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of instructions executed.
    pub instructions: u64,
    /// Source CRC-32 from the patch footer (verified).
    pub source_crc: u32,
    /// Target CRC-32 from the patch footer.
    pub target_crc: u32,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level patch application.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl IoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Read { .. } | Self::Write { .. } => ErrorCategory::Io,
            Self::Decode(e) => e.category(),
        }
    }
}

// ---------------------------------------------------------------------------
// Byte source / byte sink
// ---------------------------------------------------------------------------

/// Read a whole input file, tagging failures with its path.
pub fn read_input(path: &Path) -> Result<Vec<u8>, IoError> {
    fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Receives the finished output buffer exactly once.
pub trait ByteSink {
    /// Persist `data`. Called only after the patch applied cleanly.
    fn accept(&mut self, data: &[u8]) -> io::Result<()>;

    /// Where the data goes, for error messages.
    fn location(&self) -> &Path {
        Path::new("<memory>")
    }
}

/// In-memory sink: replaces the vector's contents.
impl ByteSink for Vec<u8> {
    fn accept(&mut self, data: &[u8]) -> io::Result<()> {
        self.clear();
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Discarding sink, for check-only runs.
impl ByteSink for io::Sink {
    fn accept(&mut self, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn location(&self) -> &Path {
        Path::new("<discard>")
    }
}

/// Writes the output to `path` atomically: a uniquely named temporary
/// file in the same directory is persisted over the destination.
#[cfg(feature = "file-io")]
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

#[cfg(feature = "file-io")]
impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

#[cfg(feature = "file-io")]
impl ByteSink for FileSink {
    fn accept(&mut self, data: &[u8]) -> io::Result<()> {
        // Dropped (and deleted) on any early return.
        let tmp = NamedTempFile::new_in(self.parent_dir())?;
        let mut w = BufWriter::with_capacity(BUF_SIZE, tmp);
        w.write_all(data)?;
        let tmp = w.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("wrote {} bytes to {}", data.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to `source_path`, writing `output_path`.
///
/// Nothing is created at `output_path` unless the whole patch applies.
#[cfg(feature = "file-io")]
pub fn apply_file(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    opts: &ApplyOptions,
) -> Result<ApplyStats, IoError> {
    apply_to_sink(source_path, patch_path, &mut FileSink::new(output_path), opts)
}

/// Apply a patch and hand the output to an arbitrary sink.
pub fn apply_to_sink<S: ByteSink>(
    source_path: &Path,
    patch_path: &Path,
    sink: &mut S,
    opts: &ApplyOptions,
) -> Result<ApplyStats, IoError> {
    let source = read_input(source_path)?;
    let patch = read_input(patch_path)?;
    debug!(
        "applying {} ({} bytes) to {} ({} bytes)",
        patch_path.display(),
        patch.len(),
        source_path.display(),
        source.len()
    );

    let decoder = PatchDecoder::for_source(&patch, source.len() as u64)?;
    let (output, instructions) = decoder.apply_counted(&source, opts)?;

    #[cfg(feature = "file-io")]
    let output_sha256 = {
        let mut h = sha2::Sha256::new();
        h.update(&output);
        Some(h.finalize().into())
    };
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    sink.accept(&output).map_err(|source| IoError::Write {
        path: sink.location().to_path_buf(),
        source,
    })?;

    Ok(ApplyStats {
        source_size: source.len() as u64,
        patch_size: patch.len() as u64,
        output_size: output.len() as u64,
        instructions,
        source_crc: decoder.footer().source_crc,
        target_crc: decoder.footer().target_crc,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Batch application (optional rayon pool)
// ---------------------------------------------------------------------------

/// One source/patch/output triple for `apply_batch()`.
#[cfg(feature = "file-io")]
#[derive(Debug, Clone)]
pub struct ApplyJob {
    pub source: PathBuf,
    pub patch: PathBuf,
    pub output: PathBuf,
}

/// Apply independent patches, one result per job in input order.
///
/// Runs on the rayon pool when the `parallel` feature is enabled.
#[cfg(feature = "file-io")]
pub fn apply_batch(jobs: &[ApplyJob], opts: &ApplyOptions) -> Vec<Result<ApplyStats, IoError>> {
    let run = |job: &ApplyJob| apply_file(&job.source, &job.patch, &job.output, opts);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        jobs.par_iter().map(run).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        jobs.iter().map(run).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
