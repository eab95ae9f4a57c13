use glam::Vec2;
use kornia_image::{Image, ImageError, ImageSize};

use crate::parallel;

/// Errors raised while rectifying a quadrilateral.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RectifyError {
    /// The corners do not form a convex, non-crossed quadrangle.
    #[error("the given points do not define a convex quadrangle")]
    NotConvex,

    /// At least one corner lies outside the source image.
    #[error("corner ({0}, {1}) lies outside the source image")]
    CornerOutsideImage(f32, f32),

    /// The perspective transformation is singular.
    #[error("cannot compute the perspective transformation")]
    DegenerateTransform,

    /// The requested patch has no pixels.
    #[error("invalid patch size {0}")]
    InvalidPatchSize(ImageSize),

    /// Image error.
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Apply a row-major 3x3 perspective transformation to a point.
pub fn transform_point(x: f32, y: f32, m: &[f32; 9]) -> (f32, f32) {
    let w = m[6] * x + m[7] * y + m[8];
    let xo = (m[0] * x + m[1] * y + m[2]) / w;
    let yo = (m[3] * x + m[4] * y + m[5]) / w;
    (xo, yo)
}

/// Perspective transformation mapping the unit square onto a quadrangle.
///
/// `(0, 0)`, `(1, 0)`, `(1, 1)` and `(0, 1)` map to `corners[0..4]` respectively.
///
/// # Errors
///
/// Returns [`RectifyError::DegenerateTransform`] if three corners are collinear.
pub fn square_to_quad_transform(corners: &[Vec2; 4]) -> Result<[f32; 9], RectifyError> {
    let [p0, p1, p2, p3] = *corners;
    let s = p0 - p1 + p2 - p3;

    if s.x.abs() < f32::EPSILON && s.y.abs() < f32::EPSILON {
        // parallelogram, the mapping is affine
        #[rustfmt::skip]
        let m = [
            p1.x - p0.x, p3.x - p0.x, p0.x,
            p1.y - p0.y, p3.y - p0.y, p0.y,
            0.0, 0.0, 1.0,
        ];
        return Ok(m);
    }

    let d1 = p1 - p2;
    let d2 = p3 - p2;
    let den = d1.perp_dot(d2);
    if den.abs() < f32::EPSILON {
        return Err(RectifyError::DegenerateTransform);
    }
    let g = s.perp_dot(d2) / den;
    let h = d1.perp_dot(s) / den;

    #[rustfmt::skip]
    let m = [
        p1.x - p0.x + g * p1.x, p3.x - p0.x + h * p3.x, p0.x,
        p1.y - p0.y + g * p1.y, p3.y - p0.y + h * p3.y, p0.y,
        g, h, 1.0,
    ];
    Ok(m)
}

fn is_convex(corners: &[Vec2; 4]) -> bool {
    let cross: Vec<f32> = (0..4)
        .map(|i| {
            let a = corners[(i + 1) % 4] - corners[i];
            let b = corners[(i + 2) % 4] - corners[(i + 1) % 4];
            a.perp_dot(b)
        })
        .collect();
    cross.iter().all(|&c| c > 0.0) || cross.iter().all(|&c| c < 0.0)
}

/// Rectify the quadrangle spanned by `corners` into the destination patch.
///
/// The corners are mapped onto `(0, 0)`, `(W-1, 0)`, `(W-1, H-1)` and `(0, H-1)` of the
/// destination and every destination pixel takes the nearest source pixel.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `corners` - The quadrangle corners in consistent winding order.
/// * `dst` - The destination patch.
///
/// # Errors
///
/// Fails if the quadrangle is not convex, if a corner lies outside the source image or if
/// the destination has no pixels.
///
/// # Example
///
/// ```
/// use glam::Vec2;
/// use kornia_image::Image;
/// use kornia_imgproc::warp::rectify_quad;
///
/// let src = Image::<u8, 1>::from_fn([10, 10].into(), |x, y| [(10 * y + x) as u8]);
/// let corners = [
///     Vec2::new(2.0, 2.0),
///     Vec2::new(5.0, 2.0),
///     Vec2::new(5.0, 5.0),
///     Vec2::new(2.0, 5.0),
/// ];
/// let mut patch = Image::<u8, 1>::from_size_val([4, 4].into(), 0).unwrap();
/// rectify_quad(&src, &corners, &mut patch).unwrap();
///
/// assert_eq!(patch.get([0, 0, 0]), Some(&22));
/// assert_eq!(patch.get([3, 3, 0]), Some(&55));
/// ```
pub fn rectify_quad<T, const C: usize>(
    src: &Image<T, C>,
    corners: &[Vec2; 4],
    dst: &mut Image<T, C>,
) -> Result<(), RectifyError>
where
    T: Copy + Send + Sync,
{
    if dst.width() < 2 || dst.height() < 2 {
        return Err(RectifyError::InvalidPatchSize(dst.size()));
    }
    if !is_convex(corners) {
        return Err(RectifyError::NotConvex);
    }

    let (w, h) = (src.width(), src.height());
    for c in corners {
        if !(c.x >= 0.0 && c.y >= 0.0 && c.x <= (w - 1) as f32 && c.y <= (h - 1) as f32) {
            return Err(RectifyError::CornerOutsideImage(c.x, c.y));
        }
    }

    let m = square_to_quad_transform(corners)?;
    let (su, sv) = (
        1.0 / (dst.width() - 1) as f32,
        1.0 / (dst.height() - 1) as f32,
    );
    let data = src.as_slice();

    parallel::par_iter_rows_indexed(dst, |y, row| {
        for (x, pixel) in row.chunks_exact_mut(C).enumerate() {
            let (sx, sy) = transform_point(x as f32 * su, y as f32 * sv, &m);
            let sx = (sx.round().max(0.0) as usize).min(w - 1);
            let sy = (sy.round().max(0.0) as usize).min(h - 1);
            let idx = (sy * w + sx) * C;
            pixel.copy_from_slice(&data[idx..idx + C]);
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transform_point_translation() {
        let m = [1.0, 0.0, -1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0];
        let (x, y) = transform_point(1.0, 1.0, &m);
        assert_eq!((x, y), (0.0, 2.0));
    }

    #[test]
    fn square_to_quad_maps_corners() -> Result<(), RectifyError> {
        let corners = [
            Vec2::new(10.0, 12.0),
            Vec2::new(50.0, 8.0),
            Vec2::new(60.0, 55.0),
            Vec2::new(5.0, 40.0),
        ];
        let m = square_to_quad_transform(&corners)?;
        let units = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for ((u, v), c) in units.iter().zip(corners.iter()) {
            let (x, y) = transform_point(*u, *v, &m);
            assert_relative_eq!(x, c.x, epsilon = 1e-3);
            assert_relative_eq!(y, c.y, epsilon = 1e-3);
        }
        Ok(())
    }

    #[test]
    fn rectify_rejects_bad_quads() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::from_size_val([20, 20].into(), 0)?;
        let mut dst = Image::<u8, 1>::from_size_val([8, 8].into(), 0)?;

        let crossed = [
            Vec2::new(2.0, 2.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 2.0),
            Vec2::new(2.0, 10.0),
        ];
        assert_eq!(
            rectify_quad(&src, &crossed, &mut dst),
            Err(RectifyError::NotConvex)
        );

        let outside = [
            Vec2::new(2.0, 2.0),
            Vec2::new(25.0, 2.0),
            Vec2::new(25.0, 10.0),
            Vec2::new(2.0, 10.0),
        ];
        assert_eq!(
            rectify_quad(&src, &outside, &mut dst),
            Err(RectifyError::CornerOutsideImage(25.0, 2.0))
        );
        Ok(())
    }

    #[test]
    fn rectify_rotated_square() -> Result<(), RectifyError> {
        // left half dark, right half bright
        let src = Image::<u8, 1>::from_fn([40, 40].into(), |x, _| [if x < 20 { 0 } else { 255 }]);
        // corners listed starting at the top right, so the patch is rotated by a quarter turn
        let corners = [
            Vec2::new(30.0, 10.0),
            Vec2::new(30.0, 30.0),
            Vec2::new(10.0, 30.0),
            Vec2::new(10.0, 10.0),
        ];
        let mut dst = Image::<u8, 1>::from_size_val([10, 10].into(), 7)?;
        rectify_quad(&src, &corners, &mut dst)?;

        // the top rows of the patch come from the bright right half
        assert!(dst.as_slice()[..30].iter().all(|&v| v == 255));
        assert!(dst.as_slice()[70..].iter().all(|&v| v == 0));
        Ok(())
    }
}
