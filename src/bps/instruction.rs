// BPS instruction set.
//
// Every instruction starts with one unsigned varint packing
// `(length - 1) << 2 | opcode`. TargetRead is followed by `length`
// literal bytes; SourceCopy and TargetCopy by one signed varint holding
// the relative cursor adjustment.

use std::fmt;

/// Two-bit instruction selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    SourceRead = 0,
    TargetRead = 1,
    SourceCopy = 2,
    TargetCopy = 3,
}

impl Opcode {
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        match bits & 3 {
            0 => Self::SourceRead,
            1 => Self::TargetRead,
            2 => Self::SourceCopy,
            _ => Self::TargetCopy,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SourceRead => "SOURCE_READ",
            Self::TargetRead => "TARGET_READ",
            Self::SourceCopy => "SOURCE_COPY",
            Self::TargetCopy => "TARGET_COPY",
        }
    }
}

/// Split a packed instruction word into opcode and run length.
///
/// Returns `None` when the run length does not fit in `usize`.
#[inline]
pub fn unpack(word: u64) -> Option<(Opcode, usize)> {
    let len = usize::try_from(word >> 2).ok()?.checked_add(1)?;
    Some((Opcode::from_bits(word), len))
}

/// Pack an opcode and a run length (>= 1) into an instruction word.
#[inline]
pub fn pack(opcode: Opcode, len: u64) -> u64 {
    debug_assert!(len >= 1, "instruction length must be at least 1");
    ((len - 1) << 2) | opcode as u64
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `len` bytes from the source at the current output position.
    SourceRead { len: usize },
    /// Copy `len` literal bytes from the patch stream.
    TargetRead { len: usize },
    /// Move the source cursor by `offset`, then copy `len` bytes from it.
    SourceCopy { len: usize, offset: i64 },
    /// Move the output-read cursor by `offset`, then copy `len` bytes of
    /// already-written output.
    TargetCopy { len: usize, offset: i64 },
}

#[allow(clippy::len_without_is_empty)]
impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::SourceRead { .. } => Opcode::SourceRead,
            Self::TargetRead { .. } => Opcode::TargetRead,
            Self::SourceCopy { .. } => Opcode::SourceCopy,
            Self::TargetCopy { .. } => Opcode::TargetCopy,
        }
    }

    pub fn len(&self) -> usize {
        match *self {
            Self::SourceRead { len }
            | Self::TargetRead { len }
            | Self::SourceCopy { len, .. }
            | Self::TargetCopy { len, .. } => len,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SourceRead { len } | Self::TargetRead { len } => {
                write!(f, "{:<12} {len:>10}", self.opcode().name())
            }
            Self::SourceCopy { len, offset } | Self::TargetCopy { len, offset } => {
                write!(f, "{:<12} {len:>10} {offset:+}", self.opcode().name())
            }
        }
    }
}
