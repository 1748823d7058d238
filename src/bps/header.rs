// BPS1 container header and footer.
//
// Layout:
//   "BPS1"
//   varint source_size
//   varint target_size
//   varint metadata_len, metadata bytes
//   ... instruction stream ...
//   u32le source_crc, u32le target_crc, u32le patch_crc

use std::io::{self, Write};

use super::error::DecodeError;
use super::reader::PatchReader;
use super::varint;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const BPS_MAGIC: [u8; 4] = *b"BPS1";

/// Three little-endian CRC-32 values.
pub const FOOTER_LEN: usize = 12;

/// Smallest byte count that can hold the magic and the footer.
pub const MIN_PATCH_LEN: usize = BPS_MAGIC.len() + FOOTER_LEN;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed BPS header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchHeader {
    /// Declared length of the source file.
    pub source_size: u64,
    /// Declared length of the reconstructed target.
    pub target_size: u64,
    /// Opaque metadata blob (conventionally XML). Never interpreted.
    pub metadata: Vec<u8>,
}

impl PatchHeader {
    /// Encode magic + header fields.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&BPS_MAGIC)?;
        varint::write_u64(w, self.source_size)?;
        varint::write_u64(w, self.target_size)?;
        varint::write_u64(w, self.metadata.len() as u64)?;
        w.write_all(&self.metadata)
    }

    /// Encoded length of magic + header fields.
    pub fn encoded_len(&self) -> usize {
        BPS_MAGIC.len()
            + varint::sizeof_u64(self.source_size)
            + varint::sizeof_u64(self.target_size)
            + varint::sizeof_u64(self.metadata.len() as u64)
            + self.metadata.len()
    }

    /// Parse the header from a reader positioned at the start of the patch.
    ///
    /// When `expected_source` is given, the declared source size is
    /// checked as soon as it is read, before any later field.
    pub fn decode(
        r: &mut PatchReader<'_>,
        expected_source: Option<u64>,
    ) -> Result<Self, DecodeError> {
        let magic = r.read_bytes(BPS_MAGIC.len())?;
        if magic != BPS_MAGIC {
            return Err(DecodeError::BadMagic {
                found: magic.to_vec(),
            });
        }

        let source_size = r.read_u64("source size")?;
        if let Some(actual) = expected_source
            && actual != source_size
        {
            return Err(DecodeError::SourceSizeMismatch {
                expected: source_size,
                actual,
            });
        }

        let target_size = r.read_u64("target size")?;
        let metadata_len = r.read_usize("metadata length")?;
        let metadata = r.read_bytes(metadata_len)?.to_vec();

        Ok(Self {
            source_size,
            target_size,
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

/// The three checksums that close every patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchFooter {
    pub source_crc: u32,
    pub target_crc: u32,
    /// CRC-32 of every patch byte before this field.
    pub patch_crc: u32,
}

impl PatchFooter {
    /// Read the footer from the last `FOOTER_LEN` bytes of `patch`.
    pub fn decode(patch: &[u8]) -> Result<Self, DecodeError> {
        let Some(tail) = patch.len().checked_sub(FOOTER_LEN).map(|at| &patch[at..]) else {
            return Err(DecodeError::Truncated {
                len: patch.len(),
                min: FOOTER_LEN,
            });
        };
        let word = |i: usize| u32::from_le_bytes([tail[i], tail[i + 1], tail[i + 2], tail[i + 3]]);
        Ok(Self {
            source_crc: word(0),
            target_crc: word(4),
            patch_crc: word(8),
        })
    }

    /// Write source and target checksums. The patch checksum is written
    /// separately since it covers these eight bytes.
    pub fn encode_partial<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.source_crc.to_le_bytes())?;
        w.write_all(&self.target_crc.to_le_bytes())
    }
}

/// Split a patch into its body (header + instructions) and footer bytes.
pub fn split_footer(patch: &[u8]) -> Result<(&[u8], &[u8]), DecodeError> {
    if patch.len() < MIN_PATCH_LEN {
        return Err(DecodeError::Truncated {
            len: patch.len(),
            min: MIN_PATCH_LEN,
        });
    }
    Ok(patch.split_at(patch.len() - FOOTER_LEN))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bps::error::ErrorCategory;

    #[test]
    fn header_encode_decode() {
        let hdr = PatchHeader {
            source_size: 1 << 20,
            target_size: 300,
            metadata: b"<patch/>".to_vec(),
        };
        let mut buf = Vec::new();
        hdr.encode(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"BPS1");
        assert_eq!(buf.len(), hdr.encoded_len());

        let mut r = PatchReader::new(&buf);
        let decoded = PatchHeader::decode(&mut r, Some(1 << 20)).unwrap();
        assert_eq!(decoded, hdr);
        assert!(r.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let data = b"UPS1\x80\x80\x80";
        let err = PatchHeader::decode(&mut PatchReader::new(data), None).unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { ref found } if found == b"UPS1"));
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn source_size_checked_before_later_fields() {
        // Source size 3, then nothing: the mismatch wins over truncation.
        let data = b"BPS1\x83";
        let err = PatchHeader::decode(&mut PatchReader::new(data), Some(4)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::SourceSizeMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn metadata_past_end_is_bounds_error() {
        let data = b"BPS1\x80\x80\x85abc";
        let err = PatchHeader::decode(&mut PatchReader::new(data), None).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Bounds);
    }

    #[test]
    fn footer_is_little_endian() {
        let mut patch = b"BPS1".to_vec();
        let footer = PatchFooter {
            source_crc: 0x1122_3344,
            target_crc: 0x5566_7788,
            patch_crc: 0,
        };
        footer.encode_partial(&mut patch).unwrap();
        patch.extend_from_slice(&0xAABB_CCDDu32.to_le_bytes());
        assert_eq!(&patch[4..8], &[0x44, 0x33, 0x22, 0x11]);

        let decoded = PatchFooter::decode(&patch).unwrap();
        assert_eq!(decoded.source_crc, 0x1122_3344);
        assert_eq!(decoded.target_crc, 0x5566_7788);
        assert_eq!(decoded.patch_crc, 0xAABB_CCDD);
    }

    #[test]
    fn split_rejects_short_patch() {
        let err = split_footer(b"BPS1\x80\x80\x80").unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { len: 7, min: 16 }));
        let (body, footer) = split_footer(&[0u8; 20]).unwrap();
        assert_eq!((body.len(), footer.len()), (8, FOOTER_LEN));
    }
}
