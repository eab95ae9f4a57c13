use glam::Vec2;
use kornia_imgproc::{
    calibration::DistortionModel,
    parallel::{ExecuteExt, ExecutionStrategy},
};

/// Parameters of the iterative inverse distortion.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SolverConfig {
    /// Maximum number of updates per point after the first one.
    pub max_iterations: usize,
    /// A point is solved once both components of the residual are below this value, in pixels.
    pub tolerance: f32,
    /// Step of the forward difference, applied to both axes at once.
    pub step: f32,
    /// Step length of each update.
    pub lambda: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 0.05,
            step: 0.01,
            lambda: 0.5,
        }
    }
}

/// Finds the undistorted position of a single observed point.
///
/// Starting at the observation, the estimate moves against a forward difference of the
/// absolute residual, scaled by the residual itself. The result is best effort: when the
/// iteration budget runs out the last estimate is returned, and when an update produces a
/// non finite value the last finite estimate is returned.
///
/// # Arguments
///
/// * `model` - The forward distortion model.
/// * `observed` - The distorted point.
/// * `config` - The solver parameters.
///
/// # Returns
///
/// A point `p` with `model.apply(p)` close to `observed`.
pub fn solve_point(model: &DistortionModel, observed: Vec2, config: &SolverConfig) -> Vec2 {
    let h = Vec2::splat(config.step);
    let scale = config.lambda / config.step;
    let residual = |p: Vec2| (model.apply(p) - observed).abs();

    let mut p = observed;
    for _ in 0..=config.max_iterations {
        let fx = residual(p);
        if fx.x < config.tolerance && fx.y < config.tolerance {
            break;
        }
        let fxh = residual(p + h);
        let grad = (fxh - fx) * scale * fx;

        let next = p - grad;
        if !next.is_finite() {
            break;
        }
        p = next;
    }
    p
}

/// Runs the inverse distortion over a batch of points.
pub trait SolverBackend: Send + Sync {
    /// Solves every point of `observed` and returns the results in the same order.
    fn solve(&self, model: &DistortionModel, config: &SolverConfig, observed: &[Vec2]) -> Vec<Vec2>;
}

/// Solves the points one after the other on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBackend;

impl SolverBackend for SequentialBackend {
    fn solve(&self, model: &DistortionModel, config: &SolverConfig, observed: &[Vec2]) -> Vec<Vec2> {
        observed
            .iter()
            .map(|&p| solve_point(model, p, config))
            .collect()
    }
}

/// Solves the points in parallel with rayon.
///
/// Falls back to the sequential loop if the strategy cannot be executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBackend {
    /// How the batch is distributed over threads.
    pub strategy: ExecutionStrategy,
}

impl SolverBackend for ParallelBackend {
    fn solve(&self, model: &DistortionModel, config: &SolverConfig, observed: &[Vec2]) -> Vec<Vec2> {
        let mut out = vec![Vec2::ZERO; observed.len()];
        let res = observed.execute_with(self.strategy, &mut out, |(&p, dst)| {
            *dst = solve_point(model, p, config);
        });
        match res {
            Ok(()) => out,
            Err(e) => {
                log::debug!("parallel inverse distortion unavailable ({e}), running sequentially");
                SequentialBackend.solve(model, config, observed)
            }
        }
    }
}

/// Selects the batch backend of an [`InverseDistortionSolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SolverBackendKind {
    /// [`SequentialBackend`].
    #[default]
    Sequential,
    /// [`ParallelBackend`] with the given strategy.
    Parallel(ExecutionStrategy),
}

impl SolverBackendKind {
    fn backend(self) -> Box<dyn SolverBackend> {
        match self {
            SolverBackendKind::Sequential => Box::new(SequentialBackend),
            SolverBackendKind::Parallel(strategy) => Box::new(ParallelBackend { strategy }),
        }
    }
}

/// Inverts a lens distortion model numerically for batches of points.
///
/// # Example
///
/// ```
/// use glam::Vec2;
/// use kornia_imgproc::calibration::DistortionModel;
/// use kornia_fiducial::undistort::{InverseDistortionSolver, SolverBackendKind, SolverConfig};
///
/// let model = DistortionModel::from_coefficients(
///     [-0.05, 0.01, 0.0, 0.0, 0.0, 320.0, 240.0, 320.0, 240.0],
/// );
/// let solver = InverseDistortionSolver::new(model, SolverConfig::default(), SolverBackendKind::Sequential);
///
/// let observed = model.apply(Vec2::new(100.0, 50.0));
/// let solved = solver.undistort_points(&[observed]);
/// assert!(model.apply(solved[0]).distance(observed) < 0.1);
/// ```
pub struct InverseDistortionSolver {
    model: DistortionModel,
    config: SolverConfig,
    backend: Box<dyn SolverBackend>,
}

impl InverseDistortionSolver {
    /// Creates a solver for the given model.
    pub fn new(model: DistortionModel, config: SolverConfig, kind: SolverBackendKind) -> Self {
        Self::with_backend(model, config, kind.backend())
    }

    /// Creates a solver with a custom batch backend.
    pub fn with_backend(
        model: DistortionModel,
        config: SolverConfig,
        backend: Box<dyn SolverBackend>,
    ) -> Self {
        Self {
            model,
            config,
            backend,
        }
    }

    /// The distortion model being inverted.
    #[inline]
    pub fn model(&self) -> &DistortionModel {
        &self.model
    }

    /// Replaces the distortion model.
    #[inline]
    pub fn set_model(&mut self, model: DistortionModel) {
        self.model = model;
    }

    /// The solver parameters.
    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Undistorts a single point on the calling thread.
    pub fn solve_point(&self, observed: Vec2) -> Vec2 {
        solve_point(&self.model, observed, &self.config)
    }

    /// Undistorts a batch of points with the configured backend.
    pub fn undistort_points(&self, observed: &[Vec2]) -> Vec<Vec2> {
        self.backend.solve(&self.model, &self.config, observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> DistortionModel {
        DistortionModel::from_coefficients([-0.05, 0.01, 0.001, -0.001, 0.0, 320.0, 240.0, 320.0, 240.0])
    }

    #[test]
    fn identity_model_is_a_fixed_point() {
        let model = DistortionModel::identity(640, 480);
        let p = Vec2::new(12.5, 400.0);
        assert_eq!(solve_point(&model, p, &SolverConfig::default()), p);
    }

    #[test]
    fn solved_point_maps_back() {
        let model = model();
        let config = SolverConfig::default();
        for p in [Vec2::new(10.0, 10.0), Vec2::new(600.0, 30.0), Vec2::new(320.0, 470.0)] {
            let observed = model.apply(p);
            let solved = solve_point(&model, observed, &config);
            let back = model.apply(solved);
            assert!((back - observed).abs().max_element() < config.tolerance, "{p}");
        }
    }

    #[test]
    fn iteration_budget_is_respected() {
        let model = model();
        let observed = model.apply(Vec2::new(10.0, 10.0));
        let config = SolverConfig {
            max_iterations: 0,
            ..Default::default()
        };
        // a single update from the observation
        let solved = solve_point(&model, observed, &config);
        assert_ne!(solved, observed);
        let unbounded = solve_point(&model, observed, &SolverConfig::default());
        assert!(model.apply(unbounded).distance(observed) < model.apply(solved).distance(observed));
    }

    #[test]
    fn non_finite_model_returns_last_estimate() {
        let model = DistortionModel::from_coefficients([0.0; 9]);
        let observed = Vec2::new(3.0, 4.0);
        assert_eq!(solve_point(&model, observed, &SolverConfig::default()), observed);
    }

    #[test]
    fn backends_agree() {
        let model = model();
        let config = SolverConfig::default();
        let observed = (0..50)
            .map(|i| model.apply(Vec2::new(i as f32 * 12.0, 480.0 - i as f32 * 9.0)))
            .collect::<Vec<_>>();

        let sequential = SequentialBackend.solve(&model, &config, &observed);
        for strategy in [
            ExecutionStrategy::ParallelElements,
            ExecutionStrategy::AutoRows(8),
            ExecutionStrategy::Serial,
            ExecutionStrategy::Fixed(2),
            // invalid, runs sequentially
            ExecutionStrategy::Fixed(0),
        ] {
            let parallel = ParallelBackend { strategy }.solve(&model, &config, &observed);
            assert_eq!(parallel, sequential, "{strategy:?}");
        }
    }
}
