use kornia_image::{Image, ImageError};

use crate::parallel;

/// Parameters of the local (adaptive) threshold.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LocalThresholdConfig {
    /// Side length of the square averaging window in pixels.
    pub mask_size: usize,
    /// Offset added to the local mean before comparing.
    pub global_threshold: f32,
    /// Slope of the soft (gamma) output. A value of zero yields a hard binary output.
    pub gamma_slope: f32,
}

impl Default for LocalThresholdConfig {
    fn default() -> Self {
        Self {
            mask_size: 30,
            global_threshold: -10.0,
            gamma_slope: 0.0,
        }
    }
}

/// Summed-area table with one extra leading row and column of zeros.
struct IntegralImage {
    stride: usize,
    data: Vec<u64>,
}

impl IntegralImage {
    fn new(src: &Image<u8, 1>) -> Self {
        let (w, h) = (src.width(), src.height());
        let stride = w + 1;
        let mut data = vec![0u64; stride * (h + 1)];
        for (y, row) in src.as_slice().chunks_exact(w.max(1)).take(h).enumerate() {
            let mut acc = 0u64;
            for (x, &v) in row.iter().enumerate() {
                acc += v as u64;
                data[(y + 1) * stride + x + 1] = data[y * stride + x + 1] + acc;
            }
        }
        Self { stride, data }
    }

    /// Sum over the half-open rectangle `[x0, x1) x [y0, y1)`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.data[y1 * s + x1] + self.data[y0 * s + x0]
            - self.data[y0 * s + x1]
            - self.data[y1 * s + x0]
    }
}

/// Binarize an image by comparing every pixel against the mean of its neighbourhood.
///
/// The neighbourhood of pixel `(x, y)` is the window `[x - r, x + r) x [y - r, y + r)`
/// with `r = mask_size / 2`, clipped to the image. With a zero `gamma_slope` the output
/// is `255` where `src > mean + global_threshold` and `0` elsewhere; otherwise the output
/// is `clamp(gamma_slope * (src - mean - global_threshold) + 128, 0, 255)`.
///
/// # Arguments
///
/// * `src` - The input grayscale image.
/// * `dst` - The output image, same size as the input.
/// * `config` - The threshold parameters.
///
/// # Examples
///
/// ```
/// use kornia_image::{Image, ImageSize};
/// use kornia_imgproc::threshold::{local_threshold, LocalThresholdConfig};
///
/// let image = Image::<u8, 1>::from_fn(ImageSize { width: 8, height: 8 }, |x, _| {
///     [if x < 4 { 0 } else { 200 }]
/// });
/// let mut binary = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
///
/// local_threshold(&image, &mut binary, &LocalThresholdConfig::default()).unwrap();
/// assert_eq!(binary.get([0, 7, 0]), Some(&255));
/// assert_eq!(binary.get([0, 0, 0]), Some(&0));
/// ```
pub fn local_threshold(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    config: &LocalThresholdConfig,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let (w, h) = (src.width(), src.height());
    let r = (config.mask_size / 2).max(1);
    let t = config.global_threshold as f64;
    let slope = config.gamma_slope as f64;
    let integral = IntegralImage::new(src);
    let src_data = src.as_slice();

    parallel::par_iter_rows_indexed(dst, |y, row| {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r).min(h);
        for (x, out) in row.iter_mut().enumerate() {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r).min(w);
            let area = ((x1 - x0) * (y1 - y0)) as f64;
            let sum = integral.sum(x0, y0, x1, y1) as f64;
            let v = src_data[y * w + x] as f64;

            *out = if slope == 0.0 {
                if v * area > sum + t * area {
                    255
                } else {
                    0
                }
            } else {
                let mean = sum / area;
                (slope * (v - mean - t) + 128.0).clamp(0.0, 255.0) as u8
            };
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kornia_image::ImageSize;

    #[test]
    fn integral_image_sum() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new(ImageSize { width: 3, height: 2 }, vec![1, 2, 3, 4, 5, 6])?;
        let integral = IntegralImage::new(&image);
        assert_eq!(integral.sum(0, 0, 3, 2), 21);
        assert_eq!(integral.sum(1, 0, 3, 2), 16);
        assert_eq!(integral.sum(1, 1, 2, 2), 5);
        Ok(())
    }

    #[test]
    fn local_threshold_square() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 40,
            height: 40,
        };
        let image = Image::<u8, 1>::from_fn(size, |x, y| {
            [if (15..25).contains(&x) && (15..25).contains(&y) {
                255
            } else {
                0
            }]
        });
        let mut dst = Image::from_size_val(size, 0u8)?;
        local_threshold(&image, &mut dst, &LocalThresholdConfig::default())?;

        assert_eq!(dst.get([20, 20, 0]), Some(&255));
        assert_eq!(dst.get([15, 15, 0]), Some(&255));
        assert_eq!(dst.get([14, 20, 0]), Some(&0));
        // flat background far from the square is above its own mean minus the offset
        assert_eq!(dst.get([0, 0, 0]), Some(&255));
        Ok(())
    }

    #[test]
    fn local_threshold_flat_image_is_foreground() -> Result<(), ImageError> {
        // a negative global threshold marks a flat region as foreground
        let image = Image::<u8, 1>::from_size_val([10, 10].into(), 50)?;
        let mut dst = Image::from_size_val(image.size(), 0u8)?;
        local_threshold(&image, &mut dst, &LocalThresholdConfig::default())?;
        assert!(dst.as_slice().iter().all(|&v| v == 255));
        Ok(())
    }

    #[test]
    fn local_threshold_gamma() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_size_val([6, 6].into(), 100)?;
        let mut dst = Image::from_size_val(image.size(), 0u8)?;
        let config = LocalThresholdConfig {
            gamma_slope: 2.0,
            global_threshold: 5.0,
            ..Default::default()
        };
        local_threshold(&image, &mut dst, &config)?;
        // 2 * (100 - 100 - 5) + 128
        assert!(dst.as_slice().iter().all(|&v| v == 118));
        Ok(())
    }

    #[test]
    fn local_threshold_size_mismatch() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_size_val([6, 6].into(), 100)?;
        let mut dst = Image::from_size_val([5, 6].into(), 0u8)?;
        let res = local_threshold(&image, &mut dst, &LocalThresholdConfig::default());
        assert_eq!(res, Err(ImageError::InvalidImageSize(6, 6, 5, 6)));
        Ok(())
    }
}
