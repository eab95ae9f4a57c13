use kornia_image::{Image, ImageError};

use crate::parallel;

/// Resize an image to the size of `dst` using nearest neighbour sampling.
///
/// Destination pixel `x` samples the source at `floor((x + 0.5) * src_w / dst_w)`,
/// so that pixel centers are aligned.
///
/// # Arguments
///
/// * `src` - The input image container.
/// * `dst` - The output image container; its size defines the target size.
///
/// # Example
///
/// ```
/// use kornia_image::{Image, ImageSize};
/// use kornia_imgproc::resize::resize_nearest;
///
/// let image = Image::<u8, 1>::new(
///     ImageSize {
///         width: 4,
///         height: 2,
///     },
///     vec![0, 1, 2, 3, 4, 5, 6, 7],
/// )
/// .unwrap();
///
/// let mut resized = Image::<u8, 1>::from_size_val([2, 1].into(), 0).unwrap();
/// resize_nearest(&image, &mut resized).unwrap();
///
/// assert_eq!(resized.as_slice(), &[5, 7]);
/// ```
pub fn resize_nearest<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync,
{
    if src.is_empty() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    if src.size() == dst.size() {
        dst.as_slice_mut().copy_from_slice(src.as_slice());
        return Ok(());
    }

    let (sw, sh) = (src.width(), src.height());
    let (dw, dh) = (dst.width(), dst.height());
    let map = |x: usize, s: usize, d: usize| (((2 * x + 1) * s) / (2 * d)).min(s - 1);
    let cols: Vec<usize> = (0..dw).map(|x| map(x, sw, dw)).collect();
    let data = src.as_slice();

    parallel::par_iter_rows_indexed(dst, |y, row| {
        let sy = map(y, sh, dh);
        for (pixel, &sx) in row.chunks_exact_mut(C).zip(cols.iter()) {
            let idx = (sy * sw + sx) * C;
            pixel.copy_from_slice(&data[idx..idx + C]);
        }
    });

    Ok(())
}
