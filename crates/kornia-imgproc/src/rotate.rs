use kornia_image::Image;

/// Rotate an image by 90 degrees.
///
/// The output has the width and height swapped and `dst(x, y) = src(W - 1 - y, x)`,
/// i.e. row `y` of the output is column `W - 1 - y` of the input read top to bottom.
/// Applying the rotation four times yields the input again.
///
/// # Example
///
/// ```
/// use kornia_image::Image;
/// use kornia_imgproc::rotate::rotate90;
///
/// let image = Image::<u8, 1>::new([2, 2].into(), vec![1, 2, 3, 4]).unwrap();
/// let rotated = rotate90(&image);
/// assert_eq!(rotated.as_slice(), &[2, 4, 1, 3]);
/// ```
pub fn rotate90<T, const C: usize>(src: &Image<T, C>) -> Image<T, C>
where
    T: Copy,
{
    let (w, h) = (src.width(), src.height());
    let data = src.as_slice();
    Image::from_fn([h, w].into(), |x, y| {
        let sx = w - 1 - y;
        let idx = (x * w + sx) * C;
        std::array::from_fn(|c| data[idx + c])
    })
}

/// Rotate an image by `times` quarter turns using [`rotate90`].
pub fn rotate90_n<T, const C: usize>(src: &Image<T, C>, times: usize) -> Image<T, C>
where
    T: Copy,
{
    let mut out = src.clone();
    for _ in 0..times % 4 {
        out = rotate90(&out);
    }
    out
}
