use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kornia_image::{Image, ImageSize};
use kornia_imgproc::corners::{CssConfig, CssCornerDetector};
use kornia_imgproc::regions::{find_regions, RegionConfig};

// grid of bright squares on a dark background
fn create_test_mask(width: usize, height: usize) -> Image<u8, 1> {
    Image::from_fn(ImageSize { width, height }, |x, y| {
        let inside = (x % 80) > 20 && (x % 80) < 60 && (y % 80) > 20 && (y % 80) < 60;
        [if inside { 255 } else { 0 }]
    })
}

fn bench_regions(c: &mut Criterion) {
    let mut group = c.benchmark_group("Regions");

    let (w, h) = (1280, 720);
    let mask = create_test_mask(w, h);
    let config = RegionConfig {
        min_value: 255,
        ..Default::default()
    };

    group.bench_with_input(
        BenchmarkId::new("find_regions", format!("{w}x{h}")),
        &mask,
        |b, mask| b.iter(|| find_regions(mask, &config)),
    );

    let regions = find_regions(&mask, &config);
    let detector = CssCornerDetector::new(CssConfig::default());
    group.bench_function("css_corners", |b| {
        b.iter(|| {
            regions
                .iter()
                .map(|r| detector.detect(&r.boundary).len())
                .sum::<usize>()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_regions);
criterion_main!(benches);
