use oxibps::bps::varint;
use oxibps::bps::{
    ApplyOptions, Crc32, PatchDecoder, PatchWriter, Verify, apply_patch, apply_patch_with, crc32,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    SourceRead(u8),
    Literal(Vec<u8>),
    SourceCopy(u8, u16),
    TargetCopy(u8, u16),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u8..=32).prop_map(Step::SourceRead),
        proptest::collection::vec(any::<u8>(), 1..32).prop_map(Step::Literal),
        (1u8..=32, any::<u16>()).prop_map(|(l, o)| Step::SourceCopy(l, o)),
        (1u8..=64, any::<u16>()).prop_map(|(l, o)| Step::TargetCopy(l, o)),
    ]
}

/// Build a patch from `steps`, skipping steps that would be invalid at the
/// point they run, and return it with the target it describes.
fn build(source: &[u8], steps: &[Step], metadata: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
    let mut target = Vec::new();
    let mut ops: Vec<Box<dyn Fn(&mut PatchWriter)>> = Vec::new();
    for s in steps {
        match s {
            Step::SourceRead(len) => {
                let (at, len) = (target.len(), *len as usize);
                if at + len <= source.len() {
                    target.extend_from_slice(&source[at..at + len]);
                    ops.push(Box::new(move |w| w.source_read(len as u64)));
                }
            }
            Step::Literal(bytes) => {
                target.extend_from_slice(bytes);
                let bytes = bytes.clone();
                ops.push(Box::new(move |w| w.target_read(&bytes)));
            }
            Step::SourceCopy(len, from) => {
                let len = *len as usize;
                if source.len() >= len {
                    let from = *from as usize % (source.len() - len + 1);
                    target.extend_from_slice(&source[from..from + len]);
                    ops.push(Box::new(move |w| w.source_copy(len as u64, from as u64)));
                }
            }
            Step::TargetCopy(len, from) => {
                if !target.is_empty() {
                    let len = *len as usize;
                    let from = *from as usize % target.len();
                    for i in 0..len {
                        target.push(target[from + i]);
                    }
                    ops.push(Box::new(move |w| w.target_copy(len as u64, from as u64)));
                }
            }
        }
    }
    let mut w = PatchWriter::new(source.len() as u64, target.len() as u64, metadata);
    for op in &ops {
        op(&mut w);
    }
    assert_eq!(w.target_len(), target.len() as u64);
    (w.finish(source, &target), target)
}

proptest! {
    #[test]
    fn prop_written_patches_roundtrip(
        source in proptest::collection::vec(any::<u8>(), 0..512),
        steps in proptest::collection::vec(step(), 0..24),
        metadata in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        let (patch, target) = build(&source, &steps, metadata);
        let opts = ApplyOptions { verify: Verify::ALL, ..Default::default() };
        let out = apply_patch_with(&source, &patch, &opts).unwrap();
        prop_assert_eq!(out, target);
    }

    #[test]
    fn prop_apply_is_deterministic(
        source in proptest::collection::vec(any::<u8>(), 0..256),
        steps in proptest::collection::vec(step(), 0..16),
    ) {
        let (patch, _) = build(&source, &steps, Vec::new());
        let a = apply_patch(&source, &patch).unwrap();
        let b = apply_patch(&source, &patch).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_identical_source_single_read(source in proptest::collection::vec(any::<u8>(), 1..4096)) {
        let mut w = PatchWriter::new(source.len() as u64, source.len() as u64, Vec::new());
        w.source_read(source.len() as u64);
        let patch = w.finish(&source, &source);
        prop_assert_eq!(apply_patch(&source, &patch).unwrap(), source);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let opts = ApplyOptions { verify: Verify::ALL, max_target_size: 1 << 16 };
        let _ = apply_patch_with(&[], &data, &opts);
        let mut prefixed = b"BPS1".to_vec();
        prefixed.extend_from_slice(&data);
        let _ = apply_patch_with(&[], &prefixed, &opts);
        if let Ok(dec) = PatchDecoder::new(&prefixed) {
            for item in dec.instructions() {
                if item.is_err() {
                    break;
                }
            }
        }
    }

    #[test]
    fn prop_flipped_source_byte_is_rejected(
        source in proptest::collection::vec(any::<u8>(), 1..512),
        idx in any::<usize>(),
    ) {
        let mut w = PatchWriter::new(source.len() as u64, source.len() as u64, Vec::new());
        w.source_read(source.len() as u64);
        let patch = w.finish(&source, &source);
        let mut bad = source.clone();
        let i = idx % bad.len();
        bad[i] ^= 0x01;
        prop_assert!(apply_patch(&bad, &patch).is_err());
    }

    #[test]
    fn prop_streaming_crc_matches_one_shot(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        split in any::<usize>(),
    ) {
        let at = if data.is_empty() { 0 } else { split % (data.len() + 1) };
        let mut h = Crc32::new();
        h.update(&data[..at]);
        h.update(&data[at..]);
        prop_assert_eq!(h.finalize(), crc32(&data));
    }

    #[test]
    fn prop_varint_decodes_what_it_encodes(v in any::<u64>(), s in (i64::MIN + 1)..=i64::MAX) {
        let mut buf = [0u8; varint::MAX_VARINT_LEN];
        let n = varint::encode_u64(v, &mut buf);
        prop_assert_eq!(varint::read_u64(&buf[..n]).unwrap(), (v, n));
        let n = varint::encode_i64(s, &mut buf);
        prop_assert_eq!(varint::read_i64(&buf[..n]).unwrap(), (s, n));
    }
}
