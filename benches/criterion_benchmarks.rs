use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxibps::bps::{PatchWriter, apply_patch, crc32};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut out = vec![0u8; size];
    StdRng::seed_from_u64(seed).fill(&mut out[..]);
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

/// Same-length patch: SourceRead over equal runs, TargetRead over changed runs.
fn make_patch(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut w = PatchWriter::new(source.len() as u64, target.len() as u64, Vec::new());
    let mut i = 0;
    while i < target.len() {
        let same = source.get(i) == Some(&target[i]);
        let start = i;
        while i < target.len() && (source.get(i) == Some(&target[i])) == same {
            i += 1;
        }
        if same {
            w.source_read((i - start) as u64);
        } else {
            w.target_read(&target[start..i]);
        }
    }
    w.finish(source, target)
}

/// Patch that mostly references earlier output with short-period TargetCopy runs.
fn make_fill_patch(size: usize) -> (Vec<u8>, Vec<u8>) {
    let mut target = Vec::with_capacity(size);
    let mut w = PatchWriter::new(0, size as u64, Vec::new());
    let mut seed = 7u64;
    while target.len() < size {
        let pattern = gen_data(4, seed);
        seed += 1;
        let run = (size - target.len()).min(4096);
        let lit = run.min(pattern.len());
        w.target_read(&pattern[..lit]);
        let at = target.len();
        target.extend_from_slice(&pattern[..lit]);
        if run > lit {
            w.target_copy((run - lit) as u64, at as u64);
            for k in 0..run - lit {
                target.push(target[at + k]);
            }
        }
    }
    let patch = w.finish(b"", &target);
    (patch, target)
}

fn bench_crc32(c: &mut Criterion) {
    let mut g = c.benchmark_group("crc32_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let data = gen_data(size, 1);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(crc32(black_box(&data))));
        });
    }
    g.finish();
}

fn bench_apply_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("apply_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let source = gen_data(size, 2);
        let target = mutate(&source, 2048);
        let patch = make_patch(&source, &target);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let out = apply_patch(black_box(&source), black_box(&patch)).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_overlapping_copies(c: &mut Criterion) {
    let mut g = c.benchmark_group("target_copy_fill");
    for size in [256 * 1024usize, 4 * 1024 * 1024] {
        let (patch, target) = make_fill_patch(size);
        g.throughput(Throughput::Bytes(target.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let out = apply_patch(b"", black_box(&patch)).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_mutation_density(c: &mut Criterion) {
    let mut g = c.benchmark_group("apply_vs_mutation_stride");
    let source = gen_data(2 * 1024 * 1024, 3);
    for stride in [16usize, 256, 4096] {
        let target = mutate(&source, stride);
        let patch = make_patch(&source, &target);
        g.bench_with_input(BenchmarkId::from_parameter(stride), &stride, |b, _| {
            b.iter(|| {
                let out = apply_patch(&source, &patch).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_crc32,
    bench_apply_speed,
    bench_overlapping_copies,
    bench_mutation_density
);
criterion_main!(benches);
