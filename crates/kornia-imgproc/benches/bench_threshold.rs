use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kornia_image::{Image, ImageSize};
use kornia_imgproc::threshold::{local_threshold, LocalThresholdConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn create_test_image(width: usize, height: usize) -> Image<u8, 1> {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<u8> = (0..(width * height)).map(|_| rng.random()).collect();
    Image::new(ImageSize { width, height }, data).unwrap()
}

fn bench_local_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("LocalThreshold");

    let (w, h) = (1280, 720);
    let src = create_test_image(w, h);

    for mask_size in [10, 30, 60] {
        let config = LocalThresholdConfig {
            mask_size,
            ..Default::default()
        };
        group.bench_with_input(
            BenchmarkId::new(format!("mask_{mask_size}"), format!("{w}x{h}")),
            &src,
            |b, src| {
                let mut dst = Image::from_size_val(src.size(), 0).unwrap();
                b.iter(|| local_threshold(src, &mut dst, &config).unwrap())
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_local_threshold);
criterion_main!(benches);
