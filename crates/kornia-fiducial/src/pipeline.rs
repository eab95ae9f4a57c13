use std::sync::Arc;

use glam::Vec2;
use kornia_image::Image;
use kornia_imgproc::{calibration::DistortionModel, regions::ImageRegion, warp::rectify_quad};

use crate::{
    detector::{QuadDetector, QuadDetectorConfig},
    errors::FiducialError,
    matcher::{MarkerMatcher, MatcherConfig, REJECTED_ID},
    undistort::{InverseDistortionSolver, SolverBackendKind, SolverConfig},
};

/// Options of the [`FiducialDetector`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FiducialDetectorConfig {
    /// Quad detection parameters.
    pub quad: QuadDetectorConfig,
    /// Template matching parameters.
    pub matcher: MatcherConfig,
    /// Inverse distortion parameters.
    pub solver: SolverConfig,
    /// Batch backend of the inverse distortion.
    pub backend: SolverBackendKind,
    /// Lens distortion of the input images, if any.
    pub distortion: Option<DistortionModel>,
}

/// An identified marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Fiducial {
    /// Id of the matching template, or [`REJECTED_ID`].
    pub id: usize,
    /// Name of the matching template, `None` for rejected quads.
    pub name: Option<String>,
    /// Quarter turns of the template as it appears in the image.
    pub rotation: usize,
    /// Matching error.
    pub error: f32,
    /// Corners in marker order, starting with the top left corner of the template and
    /// running clockwise on screen.
    pub corners: [Vec2; 4],
    /// Mean of the corners.
    pub center: Vec2,
    /// The region the marker was found in.
    pub region: Arc<ImageRegion>,
}

/// Detects quads, identifies them against a template library and optionally removes the
/// lens distortion from the resulting coordinates.
pub struct FiducialDetector {
    quads: QuadDetector,
    matcher: MarkerMatcher,
    solver: Option<InverseDistortionSolver>,
    solver_config: SolverConfig,
    backend: SolverBackendKind,
}

impl FiducialDetector {
    /// Creates a detector with an empty template library.
    pub fn new(config: FiducialDetectorConfig) -> Result<Self, FiducialError> {
        let mut detector = Self {
            quads: QuadDetector::new(config.quad),
            matcher: MarkerMatcher::new(config.matcher)?,
            solver: None,
            solver_config: config.solver,
            backend: config.backend,
        };
        detector.set_distortion(config.distortion);
        Ok(detector)
    }

    /// The quad detector.
    #[inline]
    pub fn quad_detector(&self) -> &QuadDetector {
        &self.quads
    }

    /// Mutable access to the quad detector, e.g. to change the quad color.
    #[inline]
    pub fn quad_detector_mut(&mut self) -> &mut QuadDetector {
        &mut self.quads
    }

    /// The template matcher.
    #[inline]
    pub fn matcher(&self) -> &MarkerMatcher {
        &self.matcher
    }

    /// Mutable access to the template matcher, e.g. to add templates.
    #[inline]
    pub fn matcher_mut(&mut self) -> &mut MarkerMatcher {
        &mut self.matcher
    }

    /// Sets the lens distortion of the input images. `None` reports raw image coordinates.
    pub fn set_distortion(&mut self, model: Option<DistortionModel>) {
        self.solver = model.map(|m| {
            InverseDistortionSolver::new(m, self.solver_config.clone(), self.backend)
        });
    }

    /// Detects and identifies the markers in a grayscale image.
    ///
    /// Quads that cannot be rectified or that do not match a template are skipped, unless
    /// the matcher is configured to return rejected quads.
    pub fn detect(&mut self, image: &Image<u8, 1>) -> Result<Vec<Fiducial>, FiducialError> {
        let (outer, inner) = self.matcher.quad_rectification_sizes();
        let mut patch = Image::from_size_val(outer, 0u8)?;
        let x0 = (outer.width - inner.width) / 2;
        let y0 = (outer.height - inner.height) / 2;

        let quads = self.quads.detect(image)?;
        let mut fiducials = Vec::with_capacity(quads.len());
        for quad in quads {
            if let Err(e) = rectify_quad(image, &quad.corners, &mut patch) {
                log::debug!("skipping quad of region {}: {e}", quad.region.id);
                continue;
            }
            let center = patch.crop(x0, y0, inner)?;
            let Some(result) = self.matcher.classify_patch(&center)? else {
                continue;
            };

            let id = result.id.unwrap_or(REJECTED_ID);
            let mut corners = quad.corners;
            corners.rotate_left((4 - result.rotation % 4) % 4);

            fiducials.push(Fiducial {
                id,
                name: self.matcher.template(id).map(|t| t.name.clone()),
                rotation: result.rotation,
                error: result.error,
                corners,
                center: quad.center(),
                region: quad.region.clone(),
            });
        }

        if let Some(solver) = &self.solver {
            for fiducial in fiducials.iter_mut() {
                let mut points = fiducial.corners.to_vec();
                points.push(fiducial.center);
                let solved = solver.undistort_points(&points);
                if let [a, b, c, d, center] = solved[..] {
                    fiducial.corners = [a, b, c, d];
                    fiducial.center = center;
                }
            }
        }

        log::debug!("identified {} markers", fiducials.len());

        Ok(fiducials)
    }
}
