use kornia_image::{Image, ImageError};

use crate::parallel;

/// Apply a median filter with a square window of side `kernel_size`.
///
/// The window is clipped at the image border; for an even number of samples the upper
/// median is taken.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output image, same size as the input.
/// * `kernel_size` - The odd side length of the window.
///
/// # Example
///
/// ```
/// use kornia_image::Image;
/// use kornia_imgproc::filter::median_blur;
///
/// let mut src = Image::<u8, 1>::from_size_val([5, 5].into(), 10).unwrap();
/// src.set_pixel(2, 2, 0, 255).unwrap();
///
/// let mut dst = src.clone();
/// median_blur(&src, &mut dst, 3).unwrap();
/// assert_eq!(dst.get([2, 2, 0]), Some(&10));
/// ```
pub fn median_blur<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let r = kernel_size / 2;
    let (w, h) = (src.width(), src.height());
    let data = src.as_slice();

    parallel::par_iter_rows_indexed(dst, |y, row| {
        let mut window = Vec::with_capacity(kernel_size * kernel_size);
        let (y0, y1) = (y.saturating_sub(r), (y + r + 1).min(h));
        for (x, pixel) in row.chunks_exact_mut(C).enumerate() {
            let (x0, x1) = (x.saturating_sub(r), (x + r + 1).min(w));
            for (c, out) in pixel.iter_mut().enumerate() {
                window.clear();
                for yy in y0..y1 {
                    for xx in x0..x1 {
                        window.push(data[(yy * w + xx) * C + c]);
                    }
                }
                let mid = window.len() / 2;
                *out = *window.select_nth_unstable(mid).1;
            }
        }
    });

    Ok(())
}
