use super::{Kernel, MorphologyError};
use crate::parallel;
use kornia_image::{Image, ImageError};

// Pixels of the kernel falling outside the image are ignored.
fn morph<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    kernel: &Kernel,
    pick: fn(T, T) -> T,
) -> Result<(), MorphologyError>
where
    T: Copy + Send + Sync,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        )
        .into());
    }

    let (w, h) = (src.width() as isize, src.height() as isize);
    let offsets = kernel.offsets();
    let data = src.as_slice();

    parallel::par_iter_rows_indexed(dst, |y, row| {
        let y = y as isize;
        for (x, pixel) in row.chunks_exact_mut(C).enumerate() {
            let x = x as isize;
            for (c, out) in pixel.iter_mut().enumerate() {
                let mut acc: Option<T> = None;
                for &(dx, dy) in &offsets {
                    let (px, py) = (x + dx, y + dy);
                    if px < 0 || py < 0 || px >= w || py >= h {
                        continue;
                    }
                    let v = data[((py * w + px) as usize) * C + c];
                    acc = Some(match acc {
                        Some(a) => pick(a, v),
                        None => v,
                    });
                }
                if let Some(v) = acc {
                    *out = v;
                }
            }
        }
    });

    Ok(())
}

/// Dilate an image using a [`Kernel`].
///
/// Each pixel is replaced by the maximum value in the neighbourhood defined by the kernel.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image (will be overwritten).
/// * `kernel` - The morphological structuring element.
pub fn dilate<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    kernel: &Kernel,
) -> Result<(), MorphologyError>
where
    T: Copy + Send + Sync + Ord,
{
    morph(src, dst, kernel, std::cmp::max)
}

/// Erode an image using a [`Kernel`].
///
/// Each pixel is replaced by the minimum value in the neighbourhood defined by the kernel.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image (will be overwritten).
/// * `kernel` - The morphological structuring element.
pub fn erode<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    kernel: &Kernel,
) -> Result<(), MorphologyError>
where
    T: Copy + Send + Sync + Ord,
{
    morph(src, dst, kernel, std::cmp::min)
}

/// Opening: erosion followed by dilation. Removes small bright specks.
pub fn open<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    kernel: &Kernel,
) -> Result<(), MorphologyError>
where
    T: Copy + Send + Sync + Ord,
{
    let mut tmp = src.clone();
    erode(src, &mut tmp, kernel)?;
    dilate(&tmp, dst, kernel)
}

/// Closing: dilation followed by erosion. Fills small dark holes.
pub fn close<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    kernel: &Kernel,
) -> Result<(), MorphologyError>
where
    T: Copy + Send + Sync + Ord,
{
    let mut tmp = src.clone();
    dilate(src, &mut tmp, kernel)?;
    erode(&tmp, dst, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::KernelShape;
    use kornia_image::ImageSize;

    fn dot_image() -> Result<Image<u8, 1>, ImageError> {
        let mut img = Image::from_size_val(
            ImageSize {
                width: 5,
                height: 5,
            },
            0u8,
        )?;
        img.set_pixel(2, 2, 0, 255)?;
        Ok(img)
    }

    #[test]
    fn test_dilate_dot() -> Result<(), Box<dyn std::error::Error>> {
        let src = dot_image()?;
        let mut dst = src.clone();
        let kernel = Kernel::new(KernelShape::Box { size: 3 })?;
        dilate(&src, &mut dst, &kernel)?;

        #[rustfmt::skip]
        let expected = [
            0,   0,   0,   0, 0,
            0, 255, 255, 255, 0,
            0, 255, 255, 255, 0,
            0, 255, 255, 255, 0,
            0,   0,   0,   0, 0,
        ];
        assert_eq!(dst.as_slice(), &expected);
        Ok(())
    }

    #[test]
    fn test_erode_removes_dot() -> Result<(), Box<dyn std::error::Error>> {
        let src = dot_image()?;
        let mut dst = src.clone();
        erode(&src, &mut dst, &Kernel::new(KernelShape::Box { size: 3 })?)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0));
        Ok(())
    }

    #[test]
    fn test_open_and_close() -> Result<(), Box<dyn std::error::Error>> {
        let kernel = Kernel::new(KernelShape::Box { size: 3 })?;

        // a single bright speck disappears under opening
        let src = dot_image()?;
        let mut dst = src.clone();
        open(&src, &mut dst, &kernel)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0));

        // a single dark hole is filled by closing
        let mut src: Image<u8, 1> = Image::from_size_val([7, 7].into(), 255u8)?;
        src.set_pixel(3, 3, 0, 0)?;
        let mut dst = src.clone();
        close(&src, &mut dst, &kernel)?;
        assert!(dst.as_slice().iter().all(|&v| v == 255));
        Ok(())
    }

    #[test]
    fn test_size_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let src = dot_image()?;
        let mut dst = Image::from_size_val([4, 5].into(), 0u8)?;
        let res = erode(&src, &mut dst, &Kernel::new(KernelShape::Box { size: 3 })?);
        assert!(matches!(res, Err(MorphologyError::Image(_))));
        Ok(())
    }
}
