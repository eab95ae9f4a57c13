use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use kornia_fiducial::{InverseDistortionSolver, SolverBackendKind, SolverConfig};
use kornia_imgproc::{calibration::DistortionModel, parallel::ExecutionStrategy};

fn bench_undistort(c: &mut Criterion) {
    let mut group = c.benchmark_group("InverseDistortion");

    let model = DistortionModel::from_coefficients([
        -0.05, 0.01, 0.001, -0.001, 0.0, 640.0, 360.0, 640.0, 360.0,
    ]);

    for step in [40, 10] {
        let observed = (0..720)
            .step_by(step)
            .flat_map(|y| (0..1280).step_by(step).map(move |x| Vec2::new(x as f32, y as f32)))
            .map(|p| model.apply(p))
            .collect::<Vec<_>>();

        for (name, kind) in [
            ("sequential", SolverBackendKind::Sequential),
            (
                "parallel",
                SolverBackendKind::Parallel(ExecutionStrategy::ParallelElements),
            ),
            (
                "parallel_rows",
                SolverBackendKind::Parallel(ExecutionStrategy::AutoRows(256)),
            ),
        ] {
            let solver = InverseDistortionSolver::new(model, SolverConfig::default(), kind);
            group.bench_with_input(
                BenchmarkId::new(name, observed.len()),
                &observed,
                |b, observed| b.iter(|| solver.undistort_points(observed)),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_undistort);
criterion_main!(benches);
