use std::sync::Arc;

use glam::{DVec2, IVec2, Vec2};
use kornia_imgproc::regions::ImageRegion;

use crate::errors::RefineError;

/// Minimum absolute cosine between opposite edges of a refined quad.
const MIN_OPPOSITE_EDGE_COSINE: f64 = 0.9;

/// A quadrilateral marker candidate found in an image.
///
/// The corners are ordered clockwise as seen on screen (x to the right, y downwards).
#[derive(Debug, Clone, PartialEq)]
pub struct TiltedQuad {
    /// The four corners in image coordinates.
    pub corners: [Vec2; 4],
    /// The region the quad was extracted from.
    pub region: Arc<ImageRegion>,
}

impl TiltedQuad {
    /// Create a quad, reversing the corner order if needed so that it runs clockwise.
    ///
    /// The first corner is kept in place.
    pub fn new(corners: [Vec2; 4], region: Arc<ImageRegion>) -> Self {
        let mut corners = corners;
        if signed_area(&corners) < 0.0 {
            corners.swap(1, 3);
        }
        Self { corners, region }
    }

    /// Mean of the four corners.
    pub fn center(&self) -> Vec2 {
        self.corners.iter().copied().sum::<Vec2>() * 0.25
    }
}

// twice the signed area, positive for clockwise order in image coordinates
fn signed_area(corners: &[Vec2; 4]) -> f32 {
    (0..4)
        .map(|i| corners[i].perp_dot(corners[(i + 1) % 4]))
        .sum()
}

/// Running first and second order moments of a set of boundary pixels.
#[derive(Debug, Clone, Copy, Default)]
struct LineFit {
    n: usize,
    x: f64,
    y: f64,
    xx: f64,
    xy: f64,
    yy: f64,
}

/// A line through `origin` with unit `direction`.
#[derive(Debug, Clone, Copy)]
struct Line {
    origin: DVec2,
    direction: DVec2,
}

impl LineFit {
    fn add(&mut self, p: IVec2) {
        let (x, y) = (p.x as f64, p.y as f64);
        self.n += 1;
        self.x += x;
        self.y += y;
        self.xx += x * x;
        self.xy += x * y;
        self.yy += y * y;
    }

    // principal axis of the centered second moments
    fn fit(&self) -> Option<Line> {
        if self.n == 0 {
            return None;
        }
        let f = 1.0 / self.n as f64;
        let (mx, my) = (self.x * f, self.y * f);
        let sxx = self.xx * f - mx * mx;
        let syy = self.yy * f - my * my;
        let sxy = self.xy * f - mx * my;

        let p = 0.5 * (sxx + syy);
        let d = 0.5 * (sxx - syy);
        let sdd = (d * d + sxy * sxy).sqrt();
        let angle = (p + sdd - sxx).atan2(sxy);

        Some(Line {
            origin: DVec2::new(mx, my),
            direction: DVec2::new(angle.cos(), angle.sin()),
        })
    }
}

impl Line {
    fn intersect(&self, other: &Line) -> Option<DVec2> {
        let den = self.direction.perp_dot(other.direction);
        if den.abs() < 1e-12 {
            return None;
        }
        let t = (other.origin - self.origin).perp_dot(other.direction) / den;
        let p = self.origin + self.direction * t;
        p.is_finite().then_some(p)
    }
}

/// Refine the corners of a quad by intersecting lines fitted to its boundary.
///
/// The boundary is split into four arcs at the (rounded) corner positions, starting at
/// `corners[0]`, and a line is fitted to each arc. The corners are replaced by the
/// intersections of adjacent lines. The corners are only written on success.
///
/// # Arguments
///
/// * `corners` - The four approximate corners, in boundary order.
/// * `boundary` - The closed boundary contour the corners were detected on.
///
/// # Errors
///
/// * [`RefineError::InvalidCornerCount`] if `corners` does not hold four points.
/// * [`RefineError::CornerNotInBoundary`] if the first corner is not a boundary pixel.
/// * [`RefineError::NotRectangular`] if opposite edges are not close to parallel.
/// * [`RefineError::DegenerateIntersection`] if adjacent edges do not intersect.
///
/// # Example
///
/// ```
/// use glam::{IVec2, Vec2};
/// use kornia_fiducial::quad::refine_edges;
///
/// // boundary of the square [0, 10] x [0, 10]
/// let mut boundary = Vec::new();
/// (0..10).for_each(|i| boundary.push(IVec2::new(0, i)));
/// (0..10).for_each(|i| boundary.push(IVec2::new(i, 10)));
/// (0..10).for_each(|i| boundary.push(IVec2::new(10, 10 - i)));
/// (0..10).for_each(|i| boundary.push(IVec2::new(10 - i, 0)));
///
/// let mut corners = vec![
///     Vec2::new(0.0, 1.0),
///     Vec2::new(1.0, 10.0),
///     Vec2::new(10.0, 9.0),
///     Vec2::new(9.0, 0.0),
/// ];
/// refine_edges(&mut corners, &boundary).unwrap();
/// assert!(corners[0].distance(Vec2::new(0.0, 0.0)) < 1e-3);
/// ```
pub fn refine_edges(corners: &mut [Vec2], boundary: &[IVec2]) -> Result<(), RefineError> {
    if corners.len() != 4 {
        return Err(RefineError::InvalidCornerCount(corners.len()));
    }

    let pixel = |c: Vec2| c.round().as_ivec2();
    let n = boundary.len();
    let start = boundary
        .iter()
        .position(|&p| p == pixel(corners[0]))
        .ok_or(RefineError::CornerNotInBoundary)?;

    let mut fits = [LineFit::default(); 4];
    let mut arc = 0;
    for k in 0..n {
        let p = boundary[(start + k) % n];
        while arc < 3 && p == pixel(corners[arc + 1]) {
            arc += 1;
        }
        fits[arc].add(p);
    }

    let mut lines = [None; 4];
    for (line, fit) in lines.iter_mut().zip(fits.iter()) {
        *line = fit.fit();
    }
    let [Some(a), Some(b), Some(c), Some(d)] = lines else {
        return Err(RefineError::NotRectangular);
    };

    let parallel =
        |l: &Line, m: &Line| l.direction.dot(m.direction).abs() >= MIN_OPPOSITE_EDGE_COSINE;
    if !parallel(&a, &c) || !parallel(&d, &b) {
        return Err(RefineError::NotRectangular);
    }

    let mut refined = [Vec2::ZERO; 4];
    for (out, (l, m)) in refined.iter_mut().zip([(a, d), (a, b), (c, b), (c, d)]) {
        *out = l
            .intersect(&m)
            .ok_or(RefineError::DegenerateIntersection)?
            .as_vec2();
    }
    corners.copy_from_slice(&refined);

    Ok(())
}
