use glam::Vec2;
use kornia_fiducial::{InverseDistortionSolver, SolverBackendKind, SolverConfig};
use kornia_imgproc::{calibration::DistortionModel, parallel::ExecutionStrategy};

fn model() -> DistortionModel {
    DistortionModel::from_coefficients([
        -0.05, 0.01, 0.001, -0.001, 0.0, 320.0, 240.0, 320.0, 240.0,
    ])
}

fn grid() -> Vec<Vec2> {
    (0..=480)
        .step_by(40)
        .flat_map(|y| (0..=640).step_by(40).map(move |x| Vec2::new(x as f32, y as f32)))
        .collect()
}

#[test]
fn round_trip_through_forward_model() {
    let model = model();
    let solver =
        InverseDistortionSolver::new(model, SolverConfig::default(), SolverBackendKind::Sequential);

    let observed = grid().iter().map(|&p| model.apply(p)).collect::<Vec<_>>();
    let solved = solver.undistort_points(&observed);
    assert_eq!(solved.len(), observed.len());

    for (s, o) in solved.iter().zip(observed.iter()) {
        assert!(model.apply(*s).distance(*o) < 0.1, "{s} -> {o}");
    }
}

#[test]
fn parallel_matches_sequential() {
    let model = model();
    let observed = grid().iter().map(|&p| model.apply(p)).collect::<Vec<_>>();

    let sequential =
        InverseDistortionSolver::new(model, SolverConfig::default(), SolverBackendKind::Sequential)
            .undistort_points(&observed);

    for strategy in [
        ExecutionStrategy::ParallelElements,
        ExecutionStrategy::AutoRows(17),
        ExecutionStrategy::Fixed(3),
    ] {
        let parallel = InverseDistortionSolver::new(
            model,
            SolverConfig::default(),
            SolverBackendKind::Parallel(strategy),
        )
        .undistort_points(&observed);

        for (p, s) in parallel.iter().zip(sequential.iter()) {
            assert!(p.distance(*s) < 1e-4, "{strategy:?}: {p} vs {s}");
        }
    }
}

#[test]
fn solver_model_can_be_replaced() {
    let mut solver = InverseDistortionSolver::new(
        DistortionModel::identity(640, 480),
        SolverConfig::default(),
        SolverBackendKind::Parallel(ExecutionStrategy::AutoRows(0)),
    );
    let p = Vec2::new(100.0, 100.0);
    assert_eq!(solver.solve_point(p), p);
    assert_eq!(solver.undistort_points(&[p]), vec![p]);

    solver.set_model(model());
    assert_eq!(solver.model(), &model());
    let solved = solver.solve_point(p);
    assert!(model().apply(solved).distance(p) < 0.1);
}

#[test]
fn solver_config_from_json() -> Result<(), serde_json::Error> {
    let json = r#"{"max_iterations": 10, "tolerance": 0.1, "step": 0.01, "lambda": 0.5}"#;
    let config: SolverConfig = serde_json::from_str(json)?;
    assert_eq!(config.max_iterations, 10);

    let kind: SolverBackendKind = serde_json::from_str(r#"{"Parallel": {"Fixed": 2}}"#)?;
    assert_eq!(kind, SolverBackendKind::Parallel(ExecutionStrategy::Fixed(2)));
    Ok(())
}
