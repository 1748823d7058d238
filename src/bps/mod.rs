// BPS patch format implementation.
//
// # Modules
//
// - `crc32`       : CRC-32/ISO-HDLC checksum (compile-time table)
// - `varint`      : Variable-length integers (little-endian, bijective base-128)
// - `instruction` : The four opcodes and instruction-word packing
// - `header`      : Magic, header fields and 12-byte checksum footer
// - `reader`      : Bounds-checked patch cursor
// - `decoder`     : Patch interpreter
// - `encoder`     : Instruction serializer (no match finding)
// - `error`       : Decode error taxonomy

pub mod crc32;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod instruction;
pub mod reader;
pub mod varint;

// Re-export key types for convenience.
pub use crc32::{Crc32, crc32};
pub use decoder::{
    ApplyOptions, InstructionIterator, PatchDecoder, Verify, apply_patch, apply_patch_with,
};
pub use encoder::PatchWriter;
pub use error::{BufferKind, ChecksumKind, DecodeError, ErrorCategory};
pub use header::{BPS_MAGIC, FOOTER_LEN, PatchFooter, PatchHeader};
pub use instruction::{Instruction, Opcode};
