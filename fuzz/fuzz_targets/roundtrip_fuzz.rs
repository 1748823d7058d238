#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibps::bps::{PatchWriter, apply_patch};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the split between source and target.
    let payload = &data[1..];
    let split = (data[0] as usize).min(payload.len());
    let (source, target) = payload.split_at(split);

    // Build a target from source reads where bytes agree, literals elsewhere,
    // and a trailing self-copy when the target repeats its first byte.
    let mut w = PatchWriter::new(source.len() as u64, target.len() as u64, Vec::new());
    let mut i = 0;
    while i < target.len() {
        if source.get(i) == Some(&target[i]) {
            w.source_read(1);
            i += 1;
        } else if i > 0 && target[i] == target[i - 1] {
            let start = i;
            while i < target.len() && target[i] == target[start - 1] {
                i += 1;
            }
            w.target_copy((i - start) as u64, (start - 1) as u64);
        } else {
            w.target_read(&target[i..i + 1]);
            i += 1;
        }
    }
    let patch = w.finish(source, target);

    let decoded = apply_patch(source, &patch).unwrap();
    assert_eq!(decoded, target);
});
