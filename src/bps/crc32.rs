// CRC-32/ISO-HDLC checksum (reflected, polynomial 0xEDB88320).
//
// BPS stores three of these in its footer: source, target and patch.
// The lookup table is computed at compile time, so there is no lazy
// initialization and nothing to synchronize across threads.

/// Reflected CRC-32 polynomial.
pub const CRC32_POLY: u32 = 0xEDB8_8320;

const CRC32_INIT: u32 = 0xFFFF_FFFF;

static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut j = 0;
        while j < 8 {
            c = if c & 1 != 0 {
                CRC32_POLY ^ (c >> 1)
            } else {
                c >> 1
            };
            j += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

#[inline(always)]
fn feed(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    crc
}

/// Compute the CRC-32 of `data` in one shot.
///
/// `crc32(b"") == 0` and `crc32(b"123456789") == 0xCBF43926`.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    feed(CRC32_INIT, data) ^ CRC32_INIT
}

/// Incremental CRC-32 hasher.
///
/// Feeding the same bytes in any chunking yields the same value as
/// [`crc32`].
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: CRC32_INIT }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state = feed(self.state, data);
    }

    pub fn finalize(self) -> u32 {
        self.state ^ CRC32_INIT
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
