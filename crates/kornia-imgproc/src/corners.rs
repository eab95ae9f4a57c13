use glam::{IVec2, Vec2};

use crate::filter::kernels::{gaussian_kernel_1d, gaussian_radius};

/// Gaussian tail value at which the smoothing kernel is truncated.
const GAUSS_CUTOFF: f32 = 1e-4;

/// Parameters of the curvature scale space corner detector.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CssConfig {
    /// Standard deviation of the gaussian used to smooth the boundary.
    pub sigma: f32,
    /// Curvature values are quantised to multiples of `1 / curvature_cutoff`.
    pub curvature_cutoff: f32,
    /// Maximum corner angle in degrees; straighter corners are dropped.
    pub angle_threshold: f32,
    /// A curvature maximum is kept if it reaches `rc_coeff` times the sum of its neighbouring minima.
    pub rc_coeff: f32,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            sigma: 4.2,
            curvature_cutoff: 66.0,
            angle_threshold: 180.0,
            rc_coeff: 1.0,
        }
    }
}

/// Intermediate results of a corner detection run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssAnalysis {
    /// Smoothed boundary.
    pub smoothed: Vec<Vec2>,
    /// Quantised curvature per boundary point.
    pub curvature: Vec<f32>,
    /// Boundary indices of the alternating curvature extrema.
    pub extrema: Vec<usize>,
    /// Boundary indices of the accepted corners.
    pub corners: Vec<usize>,
}

/// Curvature scale space corner detector for closed boundary contours.
///
/// The boundary is smoothed with a circular gaussian, curvature maxima are located and
/// filtered by their prominence and by the angle they enclose.
///
/// # Example
///
/// ```
/// use glam::IVec2;
/// use kornia_imgproc::corners::{CssConfig, CssCornerDetector};
///
/// // boundary of a 40x40 square, clockwise in image coordinates
/// let mut boundary = Vec::new();
/// for i in 0..39 { boundary.push(IVec2::new(10, 10 + i)); }
/// for i in 0..39 { boundary.push(IVec2::new(10 + i, 49)); }
/// for i in 0..39 { boundary.push(IVec2::new(49, 49 - i)); }
/// for i in 0..39 { boundary.push(IVec2::new(49 - i, 10)); }
///
/// let detector = CssCornerDetector::new(CssConfig::default());
/// let corners = detector.detect(&boundary);
/// assert_eq!(corners.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct CssCornerDetector {
    config: CssConfig,
}

impl CssCornerDetector {
    /// Create a detector with the given parameters.
    pub fn new(config: CssConfig) -> Self {
        Self { config }
    }

    /// The current parameters.
    pub fn config(&self) -> &CssConfig {
        &self.config
    }

    /// Change the smoothing sigma.
    pub fn set_sigma(&mut self, sigma: f32) {
        self.config.sigma = sigma;
    }

    /// Detect corners on a closed boundary, returned as boundary pixel positions.
    pub fn detect(&self, boundary: &[IVec2]) -> Vec<Vec2> {
        self.analyze(boundary)
            .corners
            .into_iter()
            .map(|i| boundary[i].as_vec2())
            .collect()
    }

    /// Run the detector and keep all intermediate results.
    ///
    /// Boundaries not longer than the smoothing kernel yield an empty analysis.
    pub fn analyze(&self, boundary: &[IVec2]) -> CssAnalysis {
        let n = boundary.len();
        let radius = gaussian_radius(self.config.sigma, GAUSS_CUTOFF);
        if 2 * radius + 1 >= n {
            return CssAnalysis::default();
        }

        let kernel = gaussian_kernel_1d(2 * radius + 1, self.config.sigma);
        let smoothed = smooth_circular(boundary, &kernel);
        let curvature = curvature(&smoothed, self.config.curvature_cutoff);
        let (offset, extrema) = find_extrema(&curvature);
        let maxima = remove_round_corners(&curvature, offset, &extrema, self.config.rc_coeff);
        let corners = remove_false_corners(&smoothed, maxima, self.config.angle_threshold);

        CssAnalysis {
            smoothed,
            curvature,
            extrema,
            corners,
        }
    }
}

fn smooth_circular(boundary: &[IVec2], kernel: &[f32]) -> Vec<Vec2> {
    let n = boundary.len();
    let r = kernel.len() / 2;
    (0..n)
        .map(|i| {
            kernel.iter().enumerate().fold(Vec2::ZERO, |acc, (j, &k)| {
                let idx = (i + n * (r / n + 1) + j - r) % n;
                acc + boundary[idx].as_vec2() * k
            })
        })
        .collect()
}

// central differences on the closed curve
fn curvature(curve: &[Vec2], cutoff: f32) -> Vec<f32> {
    let n = curve.len();
    let at = |i: usize, d: isize| curve[(i as isize + d).rem_euclid(n as isize) as usize];
    (0..n)
        .map(|i| {
            let u = (at(i, 1) - at(i, -1)) * 0.5;
            let u0 = (at(i, 0) - at(i, -2)) * 0.5;
            let u1 = (at(i, 2) - at(i, 0)) * 0.5;
            let uu = (u1 - u0) * 0.5;
            let den = u.length_squared().powf(1.5);
            let k = if den > 0.0 {
                (u.perp_dot(uu) / den).abs()
            } else {
                f32::INFINITY
            };
            (k * cutoff).round() / cutoff
        })
        .collect()
}

// Alternating minima and maxima; returns the index into `extrema` of the first maximum.
fn find_extrema(k: &[f32]) -> (usize, Vec<usize>) {
    let n = k.len();
    let mut extrema = Vec::new();
    let (mut search, offset) = if k[0] - k[n - 1] > 0.0 {
        (-1.0, 0)
    } else {
        (1.0, 1)
    };

    for i in 0..n - 1 {
        if (k[i + 1] - k[i]) * search > 0.0 {
            extrema.push(i);
            search = -search;
        }
    }
    if extrema.len() % 2 != 0 {
        extrema.push(n - 1);
    }

    (offset, extrema)
}

fn remove_round_corners(k: &[f32], offset: usize, extrema: &[usize], rc_coeff: f32) -> Vec<usize> {
    let m = extrema.len();
    (offset..m)
        .step_by(2)
        .filter(|&i| {
            let kl = k[extrema[(i + m - 1) % m]];
            let kr = k[extrema[(i + 1) % m]];
            k[extrema[i]] >= rc_coeff * (kl + kr)
        })
        .map(|i| extrema[i])
        .collect()
}

fn corner_angle(curve: &[Vec2], prev: usize, current: usize, next: usize) -> f32 {
    let right = curve[next] - curve[current];
    let left = curve[prev] - curve[current];
    let cos = (right.dot(left) / (left.length() * right.length())).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

fn remove_false_corners(curve: &[Vec2], mut maxima: Vec<usize>, angle_threshold: f32) -> Vec<usize> {
    loop {
        let m = maxima.len();
        let kept: Vec<usize> = (0..m)
            .filter(|&i| {
                let angle = corner_angle(curve, maxima[(i + m - 1) % m], maxima[i], maxima[(i + 1) % m]);
                angle <= angle_threshold || angle >= 360.0 - angle_threshold
            })
            .map(|i| maxima[i])
            .collect();

        if kept.len() == m {
            return kept;
        }
        maxima = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_boundary(x0: i32, y0: i32, side: i32) -> Vec<IVec2> {
        let s = side - 1;
        let mut b = Vec::new();
        (0..s).for_each(|i| b.push(IVec2::new(x0, y0 + i)));
        (0..s).for_each(|i| b.push(IVec2::new(x0 + i, y0 + s)));
        (0..s).for_each(|i| b.push(IVec2::new(x0 + s, y0 + s - i)));
        (0..s).for_each(|i| b.push(IVec2::new(x0 + s - i, y0)));
        b
    }

    #[test]
    fn css_square_corners() {
        let boundary = square_boundary(70, 70, 60);
        let mut detector = CssCornerDetector::new(CssConfig::default());
        detector.set_sigma(7.0);
        let mut corners = detector.detect(&boundary);
        corners.sort_by(|a, b| (a.x, a.y).partial_cmp(&(b.x, b.y)).unwrap());

        let expected = [
            Vec2::new(70.0, 70.0),
            Vec2::new(70.0, 129.0),
            Vec2::new(129.0, 70.0),
            Vec2::new(129.0, 129.0),
        ];
        assert_eq!(corners.len(), 4);
        for (c, e) in corners.iter().zip(expected.iter()) {
            assert!(c.distance(*e) <= 2.0, "{c} vs {e}");
        }
    }

    #[test]
    fn css_short_boundary_is_skipped() {
        let boundary = square_boundary(0, 0, 5);
        let detector = CssCornerDetector::new(CssConfig::default());
        assert!(detector.detect(&boundary).is_empty());
        assert_eq!(detector.analyze(&boundary), CssAnalysis::default());
    }

    #[test]
    fn css_analysis_is_consistent() {
        let boundary = square_boundary(10, 10, 50);
        let detector = CssCornerDetector::new(CssConfig::default());
        let analysis = detector.analyze(&boundary);
        assert_eq!(analysis.smoothed.len(), boundary.len());
        assert_eq!(analysis.curvature.len(), boundary.len());
        assert_eq!(analysis.extrema.len() % 2, 0);
        assert!(analysis
            .corners
            .iter()
            .all(|c| analysis.extrema.contains(c)));
    }

    #[test]
    fn find_extrema_alternates() {
        let k = [0.0, 1.0, 0.0, 2.0, 0.0, 1.0];
        let (offset, extrema) = find_extrema(&k);
        // k[0] - k[5] < 0, the first extremum found is a minimum
        assert_eq!(offset, 1);
        assert_eq!(extrema, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn smoothing_preserves_constant_curve() {
        let boundary = vec![IVec2::new(3, 4); 10];
        let kernel = gaussian_kernel_1d(5, 1.0);
        let smoothed = smooth_circular(&boundary, &kernel);
        assert!(smoothed
            .iter()
            .all(|p| p.distance(Vec2::new(3.0, 4.0)) < 1e-5));
    }
}
