// BPS patch interpreter.
//
// Stage order: magic, source size, target size, metadata, source CRC,
// instruction loop, final size check. Any failure aborts before the
// caller sees a byte of output.
//
// Cursors:
//   - patch reader    (PatchReader, bounded to the body before the footer)
//   - source_pos      (SourceCopy, moved by signed relative offsets)
//   - target_pos      (TargetCopy, reads already-written output)
//   - output.len()    (write position, append only)

use bitflags::bitflags;
use log::{debug, trace};

use super::crc32::crc32;
use super::error::{BufferKind, ChecksumKind, DecodeError};
use super::header::{BPS_MAGIC, PatchFooter, PatchHeader, split_footer};
use super::instruction::{self, Instruction, Opcode};
use super::reader::PatchReader;
use super::varint::VarIntError;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

bitflags! {
    /// Footer checksums to verify in addition to the source checksum,
    /// which is always checked.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Verify: u8 {
        /// CRC of the reconstructed target, checked after the last instruction.
        const TARGET = 1 << 0;
        /// CRC of the patch itself, checked before any instruction runs.
        const PATCH = 1 << 1;
        const ALL = Self::TARGET.bits() | Self::PATCH.bits();
    }
}

/// Default ceiling on the declared target size (4 GiB).
pub const DEFAULT_MAX_TARGET_SIZE: u64 = 1 << 32;

/// Configuration for patch application.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Extra checksums to verify.
    pub verify: Verify,
    /// Refuse patches declaring a larger target than this.
    pub max_target_size: u64,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            verify: Verify::empty(),
            max_target_size: DEFAULT_MAX_TARGET_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply `patch` to `source` with default options.
pub fn apply_patch(source: &[u8], patch: &[u8]) -> Result<Vec<u8>, DecodeError> {
    apply_patch_with(source, patch, &ApplyOptions::default())
}

/// Apply `patch` to `source`.
pub fn apply_patch_with(
    source: &[u8],
    patch: &[u8],
    opts: &ApplyOptions,
) -> Result<Vec<u8>, DecodeError> {
    let decoder = PatchDecoder::for_source(patch, source.len() as u64)?;
    decoder.apply(source, opts)
}

// ---------------------------------------------------------------------------
// PatchDecoder
// ---------------------------------------------------------------------------

/// A parsed patch: header and footer decoded, instructions not yet run.
#[derive(Debug, Clone)]
pub struct PatchDecoder<'a> {
    patch: &'a [u8],
    body: &'a [u8],
    header: PatchHeader,
    footer: PatchFooter,
    /// Offset of the first instruction.
    stream_start: usize,
}

impl<'a> PatchDecoder<'a> {
    /// Parse the header and footer of `patch`.
    pub fn new(patch: &'a [u8]) -> Result<Self, DecodeError> {
        Self::open(patch, None)
    }

    /// Like [`new`](Self::new), but rejects a patch made for a source of a
    /// different length before parsing anything past the source size.
    pub fn for_source(patch: &'a [u8], source_len: u64) -> Result<Self, DecodeError> {
        Self::open(patch, Some(source_len))
    }

    fn open(patch: &'a [u8], expected_source: Option<u64>) -> Result<Self, DecodeError> {
        // Report a foreign file as such, even when it is also too short.
        if let Some(magic) = patch.get(..BPS_MAGIC.len())
            && magic != BPS_MAGIC
        {
            return Err(DecodeError::BadMagic {
                found: magic.to_vec(),
            });
        }
        let (body, _) = split_footer(patch)?;
        let footer = PatchFooter::decode(patch)?;

        let mut reader = PatchReader::new(body);
        let header = PatchHeader::decode(&mut reader, expected_source)?;
        let stream_start = reader.position();

        debug!(
            "bps header: source {} bytes, target {} bytes, metadata {} bytes, stream {}..{}",
            header.source_size,
            header.target_size,
            header.metadata.len(),
            stream_start,
            body.len()
        );
        debug!(
            "bps footer: source {:08X}, target {:08X}, patch {:08X}",
            footer.source_crc, footer.target_crc, footer.patch_crc
        );

        Ok(Self {
            patch,
            body,
            header,
            footer,
            stream_start,
        })
    }

    pub fn header(&self) -> &PatchHeader {
        &self.header
    }

    pub fn footer(&self) -> &PatchFooter {
        &self.footer
    }

    /// Iterate over the instruction stream without executing it.
    pub fn instructions(&self) -> InstructionIterator<'a> {
        InstructionIterator {
            reader: PatchReader::at(self.body, self.stream_start),
            done: false,
        }
    }

    /// Check the patch CRC (covers everything but its own four bytes).
    pub fn verify_patch_checksum(&self) -> Result<(), DecodeError> {
        let actual = crc32(&self.patch[..self.patch.len() - 4]);
        check(ChecksumKind::Patch, self.footer.patch_crc, actual)
    }

    /// Reconstruct the target from `source`.
    pub fn apply(&self, source: &[u8], opts: &ApplyOptions) -> Result<Vec<u8>, DecodeError> {
        self.apply_counted(source, opts).map(|(output, _)| output)
    }

    /// Like [`apply`](Self::apply), also returning the number of
    /// instructions executed.
    pub fn apply_counted(
        &self,
        source: &[u8],
        opts: &ApplyOptions,
    ) -> Result<(Vec<u8>, u64), DecodeError> {
        if self.header.source_size != source.len() as u64 {
            return Err(DecodeError::SourceSizeMismatch {
                expected: self.header.source_size,
                actual: source.len() as u64,
            });
        }
        check(ChecksumKind::Source, self.footer.source_crc, crc32(source))?;
        if opts.verify.contains(Verify::PATCH) {
            self.verify_patch_checksum()?;
        }

        let target_size = self.header.target_size;
        let too_large = || DecodeError::TargetTooLarge {
            size: target_size,
            limit: opts.max_target_size,
        };
        if target_size > opts.max_target_size {
            return Err(too_large());
        }
        let target_len = usize::try_from(target_size).map_err(|_| too_large())?;
        let mut output = Vec::new();
        output.try_reserve_exact(target_len).map_err(|_| too_large())?;

        let mut interp = Interpreter {
            source,
            output,
            target_len,
            source_pos: 0,
            target_pos: 0,
        };
        let mut reader = PatchReader::at(self.body, self.stream_start);
        let mut count = 0u64;
        while !reader.is_empty() {
            let at = reader.position();
            let inst = read_instruction(&mut reader)?;
            trace!("{at:>10}: {inst}");
            interp.execute(inst, &mut reader)?;
            count += 1;
        }

        let output = interp.output;
        if output.len() != target_len {
            return Err(DecodeError::TargetSizeMismatch {
                expected: target_size,
                actual: output.len() as u64,
            });
        }
        if opts.verify.contains(Verify::TARGET) {
            check(ChecksumKind::Target, self.footer.target_crc, crc32(&output))?;
        }

        debug!("bps applied: {count} instructions, {} bytes", output.len());
        Ok((output, count))
    }
}

fn check(kind: ChecksumKind, expected: u32, actual: u32) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeError::ChecksumMismatch {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Decode one instruction word plus its relative offset, if any.
/// TargetRead literals are left in the reader.
fn read_instruction(reader: &mut PatchReader<'_>) -> Result<Instruction, DecodeError> {
    let at = reader.position();
    let word = reader.read_u64("instruction")?;
    let (opcode, len) = instruction::unpack(word).ok_or(DecodeError::VarInt {
        field: "instruction",
        offset: at,
        source: VarIntError::Overflow,
    })?;
    Ok(match opcode {
        Opcode::SourceRead => Instruction::SourceRead { len },
        Opcode::TargetRead => Instruction::TargetRead { len },
        Opcode::SourceCopy => Instruction::SourceCopy {
            len,
            offset: reader.read_i64("source offset")?,
        },
        Opcode::TargetCopy => Instruction::TargetCopy {
            len,
            offset: reader.read_i64("target offset")?,
        },
    })
}

// ---------------------------------------------------------------------------
// Instruction execution
// ---------------------------------------------------------------------------

struct Interpreter<'s> {
    source: &'s [u8],
    output: Vec<u8>,
    target_len: usize,
    source_pos: usize,
    target_pos: usize,
}

impl Interpreter<'_> {
    fn execute(&mut self, inst: Instruction, reader: &mut PatchReader<'_>) -> Result<(), DecodeError> {
        let len = inst.len();
        let write_pos = self.output.len();
        if len > self.target_len - write_pos {
            return Err(DecodeError::OutOfBounds {
                buffer: BufferKind::Target,
                offset: write_pos,
                len,
                limit: self.target_len,
            });
        }

        match inst {
            Instruction::SourceRead { .. } => {
                // Same offset in source and target.
                let bytes = slice_at(self.source, write_pos, len, BufferKind::Source)?;
                self.output.extend_from_slice(bytes);
            }

            Instruction::TargetRead { .. } => {
                self.output.extend_from_slice(reader.read_bytes(len)?);
            }

            Instruction::SourceCopy { offset, .. } => {
                self.source_pos = move_cursor(self.source_pos, offset, BufferKind::Source)?;
                let bytes = slice_at(self.source, self.source_pos, len, BufferKind::Source)?;
                self.output.extend_from_slice(bytes);
                self.source_pos += len;
            }

            Instruction::TargetCopy { offset, .. } => {
                let start = move_cursor(self.target_pos, offset, BufferKind::Target)?;
                if start >= write_pos {
                    return Err(DecodeError::OutOfBounds {
                        buffer: BufferKind::Target,
                        offset: start,
                        len,
                        limit: write_pos,
                    });
                }
                if len <= write_pos - start {
                    self.output.extend_from_within(start..start + len);
                } else {
                    // Overlapping run: each byte must see the ones just written.
                    for i in 0..len {
                        let byte = self.output[start + i];
                        self.output.push(byte);
                    }
                }
                self.target_pos = start + len;
            }
        }
        Ok(())
    }
}

#[inline]
fn slice_at(buf: &[u8], offset: usize, len: usize, kind: BufferKind) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(DecodeError::OutOfBounds {
            buffer: kind,
            offset,
            len,
            limit: buf.len(),
        })
}

#[inline]
fn move_cursor(position: usize, delta: i64, kind: BufferKind) -> Result<usize, DecodeError> {
    isize::try_from(delta)
        .ok()
        .and_then(|d| position.checked_add_signed(d))
        .ok_or(DecodeError::CursorOutOfRange {
            buffer: kind,
            position,
            delta,
        })
}

// ---------------------------------------------------------------------------
// Instruction iterator (for inspection/debugging)
// ---------------------------------------------------------------------------

/// Iterate over the decoded instructions of a patch, yielding each with
/// its byte offset in the patch. TargetRead literals are skipped.
pub struct InstructionIterator<'a> {
    reader: PatchReader<'a>,
    done: bool,
}

impl Iterator for InstructionIterator<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }
        let at = self.reader.position();
        let result = read_instruction(&mut self.reader).and_then(|inst| {
            if let Instruction::TargetRead { len } = inst {
                self.reader.skip(len)?;
            }
            Ok((at, inst))
        });
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
