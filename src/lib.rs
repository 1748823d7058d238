//! Oxibps: BPS binary patch application in Rust.
//!
//! The crate provides:
//! - A pure-Rust BPS1 decoder and instruction serializer (`bps`)
//! - File-oriented helpers with atomic output (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use oxibps::bps::{PatchWriter, apply_patch};
//!
//! let source = b"hello old world";
//! let target = b"hello new world";
//!
//! let mut w = PatchWriter::new(source.len() as u64, target.len() as u64, Vec::new());
//! w.source_read(6);
//! w.target_read(b"new");
//! w.source_read(6);
//! let patch = w.finish(source, target);
//!
//! let patched = apply_patch(source, &patch).unwrap();
//! assert_eq!(patched, target);
//! ```

pub mod bps;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;
