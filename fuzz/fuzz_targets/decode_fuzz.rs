#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibps::bps::{ApplyOptions, PatchDecoder, Verify, apply_patch, apply_patch_with};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a patch against an empty source.
    let _ = apply_patch(&[], data);

    // Split into source and patch; keep allocations bounded.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, patch) = data.split_at(split);
        let opts = ApplyOptions {
            verify: Verify::ALL,
            max_target_size: 1 << 20,
        };
        let _ = apply_patch_with(source, patch, &opts);
    }

    // Listing must stop at the first error.
    if let Ok(dec) = PatchDecoder::new(data) {
        for item in dec.instructions() {
            if item.is_err() {
                break;
            }
        }
    }
});
