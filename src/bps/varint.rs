// BPS variable-length integer encoding.
//
// Little-endian base-128: least-significant group first. Unlike LEB128
// the high bit marks the *last* byte, and every non-final byte carries an
// implicit +1 at the next group, which makes the encoding bijective:
//
//     value = sum((byte ^ 0x80) << (7 * i))
//
// Signed values (relative copy offsets) are stored as
// `magnitude << 1 | sign` on top of the unsigned form.

use std::io::{self, Write};

use thiserror::Error;

/// Maximum encoded length for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntError {
    /// Input ended before a terminal byte was seen.
    #[error("varint underflow (truncated input)")]
    Underflow,
    /// Value does not fit in 64 bits.
    #[error("varint overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode an unsigned varint from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if shift >= u64::BITS {
            return Err(VarIntError::Overflow);
        }
        let group = u64::from(byte ^ 0x80);
        if group > (u64::MAX >> shift) {
            return Err(VarIntError::Overflow);
        }
        val = val
            .checked_add(group << shift)
            .ok_or(VarIntError::Overflow)?;
        if byte & 0x80 != 0 {
            return Ok((val, i + 1));
        }
        shift += 7;
    }
    Err(VarIntError::Underflow)
}

/// Decode a signed varint: low bit is the sign, the rest the magnitude.
pub fn read_i64(data: &[u8]) -> Result<(i64, usize), VarIntError> {
    let (raw, len) = read_u64(data)?;
    // raw >> 1 always fits in i64.
    let magnitude = (raw >> 1) as i64;
    let val = if raw & 1 != 0 { -magnitude } else { magnitude };
    Ok((val, len))
}

/// Decode an unsigned varint and narrow it to `usize`.
pub fn read_usize(data: &[u8]) -> Result<(usize, usize), VarIntError> {
    let (val, len) = read_u64(data)?;
    let val = usize::try_from(val).map_err(|_| VarIntError::Overflow)?;
    Ok((val, len))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into `buf`, returning the number of bytes written (1..=10).
/// The encoded bytes are `buf[..len]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let group = (num & 0x7F) as u8;
        num >>= 7;
        if num == 0 {
            buf[i] = group | 0x80;
            return i + 1;
        }
        buf[i] = group;
        i += 1;
        num -= 1;
    }
}

/// Encode a signed value. `i64::MIN` has no representation.
#[inline]
pub fn encode_i64(num: i64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    debug_assert!(num != i64::MIN, "i64::MIN is not representable");
    let raw = (num.unsigned_abs() << 1) | u64::from(num < 0);
    encode_u64(raw, buf)
}

/// Encode a `u64` and write to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Encode an `i64` and write to a `Write` sink.
pub fn write_i64<W: Write>(w: &mut W, num: i64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_i64(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Return the encoded byte-length of a `u64` value.
#[inline]
pub fn sizeof_u64(mut num: u64) -> usize {
    let mut len = 1;
    loop {
        num >>= 7;
        if num == 0 {
            return len;
        }
        num -= 1;
        len += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
