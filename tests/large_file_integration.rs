#![cfg(feature = "file-io")]

use oxibps::bps::{ApplyOptions, PatchWriter, Verify};
use oxibps::io::apply_file;
use tempfile::NamedTempFile;

/// Same-length patch replacing `block` bytes every `stride` bytes.
fn sparse_edit_patch(source: &[u8], stride: usize, block: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut target = source.to_vec();
    let mut w = PatchWriter::new(source.len() as u64, source.len() as u64, Vec::new());
    let mut pos = 0;
    while pos + stride + block.len() <= source.len() {
        w.source_read(stride as u64);
        w.target_read(block);
        target[pos + stride..pos + stride + block.len()].copy_from_slice(block);
        pos += stride + block.len();
    }
    w.source_read((source.len() - pos) as u64);
    let patch = w.finish(source, &target);
    (patch, target)
}

fn roundtrip(size: usize) {
    let source_data: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();
    let (patch_data, target) = sparse_edit_patch(&source_data, 1 << 16, b"patched-block");

    let source = NamedTempFile::new().unwrap();
    let patch = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();
    std::fs::write(source.path(), &source_data).unwrap();
    std::fs::write(patch.path(), &patch_data).unwrap();

    let opts = ApplyOptions {
        verify: Verify::ALL,
        ..Default::default()
    };
    let stats = apply_file(source.path(), patch.path(), output.path(), &opts).unwrap();
    assert_eq!(stats.output_size, size as u64);
    assert_eq!(std::fs::read(output.path()).unwrap(), target);
}

#[test]
fn moderate_file_roundtrip() {
    roundtrip(8 * 1024 * 1024);
}

#[test]
#[ignore = "large test is opt-in due runtime and memory requirements"]
fn large_file_roundtrip() {
    roundtrip(1024 * 1024 * 1024);
}
