use glam::Vec2;

/// Radial and tangential lens distortion with its own normalization center and scale.
///
/// A pixel `(x, y)` is normalized as `((x - cx) / fx, (y - cy) / fy)`, distorted with the
/// Brown-Conrady polynomial and mapped back to pixels with the same center and scale.
///
/// # Fields
///
/// * `k1`, `k2`, `k3` - The radial distortion coefficients
/// * `p1`, `p2` - The tangential distortion coefficients
/// * `cx`, `cy` - The distortion center in pixels
/// * `fx`, `fy` - The normalization scale in pixels
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DistortionModel {
    /// The first radial distortion coefficient
    pub k1: f64,
    /// The second radial distortion coefficient
    pub k2: f64,
    /// The first tangential distortion coefficient
    pub p1: f64,
    /// The second tangential distortion coefficient
    pub p2: f64,
    /// The third radial distortion coefficient
    pub k3: f64,
    /// The x coordinate of the distortion center
    pub cx: f64,
    /// The y coordinate of the distortion center
    pub cy: f64,
    /// The normalization scale along x
    pub fx: f64,
    /// The normalization scale along y
    pub fy: f64,
}

impl DistortionModel {
    /// Build a model from the coefficient array `[k1, k2, p1, p2, k3, cx, cy, fx, fy]`.
    pub fn from_coefficients(c: [f64; 9]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
            cx: c[5],
            cy: c[6],
            fx: c[7],
            fy: c[8],
        }
    }

    /// A model that leaves every point in place, centered on an image of the given size.
    pub fn identity(width: usize, height: usize) -> Self {
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        Self::from_coefficients([0.0, 0.0, 0.0, 0.0, 0.0, cx, cy, cx.max(1.0), cy.max(1.0)])
    }

    /// The coefficients as `[k1, k2, p1, p2, k3, cx, cy, fx, fy]`.
    pub fn coefficients(&self) -> [f64; 9] {
        [
            self.k1, self.k2, self.p1, self.p2, self.k3, self.cx, self.cy, self.fx, self.fy,
        ]
    }

    /// Map an undistorted pixel to its distorted position.
    ///
    /// # Example
    ///
    /// ```
    /// use glam::Vec2;
    /// use kornia_imgproc::calibration::DistortionModel;
    ///
    /// let model = DistortionModel::identity(640, 480);
    /// assert_eq!(model.apply(Vec2::new(10.0, 20.0)), Vec2::new(10.0, 20.0));
    /// ```
    pub fn apply(&self, p: Vec2) -> Vec2 {
        let x = (p.x as f64 - self.cx) / self.fx;
        let y = (p.y as f64 - self.cy) / self.fy;
        let r2 = x * x + y * y;

        let kr = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let xd = x * kr + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * kr + 2.0 * self.p2 * x * y + self.p1 * (r2 + 2.0 * y * y);

        Vec2::new(
            (xd * self.fx + self.cx) as f32,
            (yd * self.fy + self.cy) as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distortion_center_is_fixed() {
        let model =
            DistortionModel::from_coefficients([-0.2, 0.05, 0.01, -0.01, 0.001, 320.0, 240.0, 320.0, 240.0]);
        assert_eq!(model.apply(Vec2::new(320.0, 240.0)), Vec2::new(320.0, 240.0));
    }

    #[test]
    fn distortion_radial_only() {
        let model =
            DistortionModel::from_coefficients([0.1, 0.0, 0.0, 0.0, 0.0, 100.0, 100.0, 100.0, 100.0]);
        // normalized (1, 0), r2 = 1, scale 1.1
        let p = model.apply(Vec2::new(200.0, 100.0));
        assert_relative_eq!(p.x, 210.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, 100.0, epsilon = 1e-4);
    }

    #[test]
    fn distortion_tangential() {
        let model =
            DistortionModel::from_coefficients([0.0, 0.0, 0.01, 0.02, 0.0, 0.0, 0.0, 1.0, 1.0]);
        // x = 1, y = 1, r2 = 2
        let p = model.apply(Vec2::new(1.0, 1.0));
        assert_relative_eq!(p.x, 1.0 + 2.0 * 0.01 + 0.02 * 4.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0 + 2.0 * 0.02 + 0.01 * 4.0, epsilon = 1e-6);
    }

    #[test]
    fn distortion_coefficients_roundtrip() {
        let c = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(DistortionModel::from_coefficients(c).coefficients(), c);
    }
}
