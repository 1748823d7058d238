// BPS patch serialization.
//
// Takes a sequence of SourceRead/TargetRead/SourceCopy/TargetCopy
// instructions and produces a valid BPS1 byte stream. No match finding
// happens here: callers decide which instructions to emit.

use super::crc32::crc32;
use super::header::{PatchFooter, PatchHeader};
use super::instruction::{self, Opcode};
use super::varint::{self, MAX_VARINT_LEN};

/// Accumulates instructions for one patch.
///
/// Copy instructions take absolute offsets; the writer tracks both copy
/// cursors and emits the relative deltas the format stores.
pub struct PatchWriter {
    out: Vec<u8>,
    /// Output bytes described so far.
    target_len: u64,
    source_pos: u64,
    target_pos: u64,
}

impl PatchWriter {
    /// Start a patch, writing the header immediately.
    pub fn new(source_size: u64, target_size: u64, metadata: Vec<u8>) -> Self {
        let header = PatchHeader {
            source_size,
            target_size,
            metadata,
        };
        let mut out = Vec::with_capacity(header.encoded_len() + 64);
        // Writing into a Vec cannot fail.
        let _ = header.encode(&mut out);
        Self {
            out,
            target_len: 0,
            source_pos: 0,
            target_pos: 0,
        }
    }

    /// Number of target bytes the emitted instructions produce.
    pub fn target_len(&self) -> u64 {
        self.target_len
    }

    /// Copy `len` bytes from the source at the current output position.
    pub fn source_read(&mut self, len: u64) {
        if len == 0 {
            return;
        }
        self.word(Opcode::SourceRead, len);
        self.target_len += len;
    }

    /// Emit literal bytes.
    pub fn target_read(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.word(Opcode::TargetRead, data.len() as u64);
        self.out.extend_from_slice(data);
        self.target_len += data.len() as u64;
    }

    /// Copy `len` bytes from the source starting at absolute offset `from`.
    pub fn source_copy(&mut self, len: u64, from: u64) {
        if len == 0 {
            return;
        }
        self.word(Opcode::SourceCopy, len);
        self.offset(from as i64 - self.source_pos as i64);
        self.source_pos = from + len;
        self.target_len += len;
    }

    /// Copy `len` bytes of earlier output starting at absolute offset `from`.
    /// `from` must be below the current output length; the ranges may overlap.
    pub fn target_copy(&mut self, len: u64, from: u64) {
        if len == 0 {
            return;
        }
        debug_assert!(from < self.target_len, "target copy reads unwritten output");
        self.word(Opcode::TargetCopy, len);
        self.offset(from as i64 - self.target_pos as i64);
        self.target_pos = from + len;
        self.target_len += len;
    }

    /// Append the footer and return the finished patch.
    pub fn finish(self, source: &[u8], target: &[u8]) -> Vec<u8> {
        self.finish_with(PatchFooter {
            source_crc: crc32(source),
            target_crc: crc32(target),
            patch_crc: 0,
        })
    }

    /// Append a footer with caller-supplied source/target checksums.
    /// The patch checksum is always computed.
    pub fn finish_with(mut self, footer: PatchFooter) -> Vec<u8> {
        let _ = footer.encode_partial(&mut self.out);
        let patch_crc = crc32(&self.out);
        self.out.extend_from_slice(&patch_crc.to_le_bytes());
        self.out
    }

    fn word(&mut self, op: Opcode, len: u64) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = varint::encode_u64(instruction::pack(op, len), &mut buf);
        self.out.extend_from_slice(&buf[..n]);
    }

    fn offset(&mut self, delta: i64) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = varint::encode_i64(delta, &mut buf);
        self.out.extend_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bps::decoder::{PatchDecoder, apply_patch};
    use crate::bps::instruction::Instruction;

    #[test]
    fn empty_patch_layout() {
        let patch = PatchWriter::new(0, 0, Vec::new()).finish(b"", b"");
        // magic + three one-byte zero varints + footer.
        assert_eq!(patch.len(), 4 + 3 + 12);
        assert_eq!(&patch[..7], b"BPS1\x80\x80\x80");
        assert_eq!(apply_patch(b"", &patch).unwrap(), b"");
    }

    #[test]
    fn relative_offsets_are_tracked() {
        let source = b"0123456789";
        let target = b"789012";
        let mut w = PatchWriter::new(10, 6, Vec::new());
        w.source_copy(3, 7);
        w.source_copy(3, 0);
        assert_eq!(w.target_len(), 6);
        let patch = w.finish(source, target);

        let offsets: Vec<i64> = PatchDecoder::new(&patch)
            .unwrap()
            .instructions()
            .filter_map(|r| match r.unwrap().1 {
                Instruction::SourceCopy { offset, .. } => Some(offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![7, -10]);
        assert_eq!(apply_patch(source, &patch).unwrap(), target);
    }

    #[test]
    fn zero_length_instructions_are_dropped() {
        let mut w = PatchWriter::new(0, 1, Vec::new());
        w.source_read(0);
        w.target_read(b"");
        w.source_copy(0, 5);
        w.target_read(b"z");
        w.target_copy(0, 0);
        let patch = w.finish(b"", b"z");
        let count = PatchDecoder::new(&patch).unwrap().instructions().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn footer_checksums() {
        let patch = PatchWriter::new(3, 3, Vec::new()).finish(b"abc", b"xyz");
        let footer = PatchFooter::decode(&patch).unwrap();
        assert_eq!(footer.source_crc, crc32(b"abc"));
        assert_eq!(footer.target_crc, crc32(b"xyz"));
        assert_eq!(footer.patch_crc, crc32(&patch[..patch.len() - 4]));
    }
}
