//! Criterion benchmarks for the ondas-dsp hot path
//!
//! Run with: cargo bench -p ondas-dsp
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ondas_dsp::{Decimator, Fir, Interpolator};

const BLOCK_SIZES: &[usize] = &[256, 1024, 8192];

fn lowpass_taps(len: usize) -> Vec<f32> {
    // Simple raised-cosine shape; the kernel cost is tap-count bound, the
    // actual response is irrelevant here.
    (0..len)
        .map(|i| {
            let x = i as f32 / (len - 1) as f32;
            (1.0 - (2.0 * std::f32::consts::PI * x).cos()) / len as f32
        })
        .collect()
}

fn test_signal(len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| ((i * 2654435761) & 0xFFFF) as u16 as i16)
        .collect()
}

fn bench_fir(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fir");
    let taps = lowpass_taps(48);

    for &block_size in BLOCK_SIZES {
        let input = test_signal(block_size);
        group.bench_with_input(
            BenchmarkId::new("filter", block_size),
            &block_size,
            |b, _| {
                let mut fir = Fir::new(&taps);
                b.iter(|| {
                    for &x in &input {
                        black_box(fir.filter(black_box(x)));
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_decimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("Decimator");
    let taps = lowpass_taps(48);

    for &block_size in BLOCK_SIZES {
        let input = test_signal(block_size);
        group.bench_with_input(
            BenchmarkId::new("decimate_by_4", block_size),
            &block_size,
            |b, _| {
                let mut decimator = Decimator::new(&taps, 4).unwrap();
                b.iter(|| {
                    for &x in &input {
                        black_box(decimator.decimate(black_box(x)));
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_interpolator(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interpolator");
    let taps = lowpass_taps(48);

    for &block_size in BLOCK_SIZES {
        let input = test_signal(block_size);
        group.bench_with_input(
            BenchmarkId::new("interpolate_by_4", block_size),
            &block_size,
            |b, _| {
                let mut interpolator = Interpolator::new(&taps, 4).unwrap();
                let mut burst = [0i16; 4];
                b.iter(|| {
                    for &x in &input {
                        interpolator.interpolate(black_box(x), &mut burst);
                        black_box(&burst);
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_fir, bench_decimator, bench_interpolator);
criterion_main!(benches);
