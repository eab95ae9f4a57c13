use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kornia_fiducial::{
    create_marker_image, FiducialDetector, FiducialDetectorConfig, MatchMetric, QuadColor,
};
use kornia_image::{Image, ImageSize};

fn template(seed: usize) -> Image<u8, 1> {
    Image::from_fn([4, 4].into(), |x, y| {
        let inner = (1..3).contains(&x) && (1..3).contains(&y);
        [if inner && (x + 2 * y + seed) % 3 == 0 { 0 } else { 255 }]
    })
}

// markers tiled on a white background
fn create_scene(width: usize, height: usize) -> Image<u8, 1> {
    let marker = create_marker_image(&template(0), [100, 100].into(), 0.5)
        .expect("marker image");
    Image::from_fn(ImageSize { width, height }, |x, y| {
        let (mx, my) = (x % 160, y % 160);
        if (30..130).contains(&mx) && (30..130).contains(&my) {
            [marker.as_slice()[(my - 30) * 100 + mx - 30]]
        } else {
            [255]
        }
    })
}

fn bench_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("FiducialDetector");

    let (w, h) = (1280, 720);
    let scene = create_scene(w, h);

    for metric in [
        MatchMetric::BinaryHamming,
        MatchMetric::GraySqrDist,
        MatchMetric::GrayNcc,
    ] {
        let mut config = FiducialDetectorConfig::default();
        config.quad.quad_color = QuadColor::BlackOnly;
        config.matcher.metric = metric;
        config.matcher.border_ratio = 0.5;

        let mut detector = FiducialDetector::new(config).expect("detector");
        for i in 0..3 {
            detector
                .matcher_mut()
                .add_template(format!("m{i}"), template(i))
                .expect("template");
        }

        group.bench_with_input(
            BenchmarkId::new(metric.to_string(), format!("{w}x{h}")),
            &scene,
            |b, scene| b.iter(|| detector.detect(scene).map(|f| f.len())),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_detector);
criterion_main!(benches);
