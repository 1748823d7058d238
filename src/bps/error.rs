// Error types for patch decoding.

use std::fmt;

use thiserror::Error;

use super::varint::VarIntError;

/// Which buffer an out-of-bounds access targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Patch,
    Source,
    Target,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Patch => "patch",
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

/// Which footer checksum failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Source,
    Target,
    Patch,
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
            Self::Patch => "patch",
        })
    }
}

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The patch is not well-formed or does not belong to this source.
    Format,
    /// A checksum did not match.
    Integrity,
    /// A cursor would have left its buffer.
    Bounds,
    /// Reading inputs or writing the output failed.
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Format => "format",
            Self::Integrity => "integrity",
            Self::Bounds => "bounds",
            Self::Io => "io",
        })
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a BPS patch: bad magic {found:02X?}")]
    BadMagic { found: Vec<u8> },

    #[error("patch truncated: {len} bytes, need at least {min}")]
    Truncated { len: usize, min: usize },

    #[error("wrong source file: patch expects {expected} bytes, got {actual}")]
    SourceSizeMismatch { expected: u64, actual: u64 },

    #[error("target size {size} exceeds limit {limit}")]
    TargetTooLarge { size: u64, limit: u64 },

    #[error("bad {field} at patch offset {offset}: {source}")]
    VarInt {
        field: &'static str,
        offset: usize,
        #[source]
        source: VarIntError,
    },

    #[error("{kind} checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch {
        kind: ChecksumKind,
        expected: u32,
        actual: u32,
    },

    #[error("{buffer} access out of bounds: {len} bytes at offset {offset}, length {limit}")]
    OutOfBounds {
        buffer: BufferKind,
        offset: usize,
        len: usize,
        limit: usize,
    },

    #[error("{buffer} cursor out of range: {position} {delta:+}")]
    CursorOutOfRange {
        buffer: BufferKind,
        position: usize,
        delta: i64,
    },

    #[error("target size mismatch: header declares {expected} bytes, instructions produced {actual}")]
    TargetSizeMismatch { expected: u64, actual: u64 },
}

impl DecodeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BadMagic { .. }
            | Self::Truncated { .. }
            | Self::SourceSizeMismatch { .. }
            | Self::TargetTooLarge { .. }
            | Self::TargetSizeMismatch { .. } => ErrorCategory::Format,
            Self::VarInt { source, .. } => match source {
                VarIntError::Underflow => ErrorCategory::Bounds,
                VarIntError::Overflow => ErrorCategory::Format,
            },
            Self::ChecksumMismatch { .. } => ErrorCategory::Integrity,
            Self::OutOfBounds { .. } | Self::CursorOutOfRange { .. } => ErrorCategory::Bounds,
        }
    }
}
