use super::MorphologyError;

/// Shapes of morphological `Kernels`.
///
/// All kernels are centered at their geometric center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelShape {
    /// A square box where every element takes part in the operation.
    Box {
        /// The side length of the square kernel (size x size).
        size: usize,
    },

    /// A plus shaped element covering the center row and column.
    Cross {
        /// The side length of the square cross kernel (size x size).
        size: usize,
    },
}

/// A morphological structuring element.
///
/// Stores a binary mask where `true` marks the pixels included in the operation.
///
/// # Example
///
/// ```rust
/// use kornia_imgproc::morphology::{Kernel, KernelShape};
///
/// let kernel = Kernel::new(KernelShape::Box { size: 3 }).unwrap();
/// assert_eq!(kernel.width(), 3);
/// assert_eq!(kernel.height(), 3);
/// assert_eq!(kernel.pad(), (1, 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    data: Vec<bool>,
    width: usize,
    height: usize,
}

impl Kernel {
    /// Create a morphological kernel from a shape.
    ///
    /// # Errors
    ///
    /// Fails for zero or even sizes.
    pub fn new(shape: KernelShape) -> Result<Self, MorphologyError> {
        let size = match shape {
            KernelShape::Box { size } | KernelShape::Cross { size } => size,
        };
        if size == 0 {
            return Err(MorphologyError::EmptyKernel);
        }
        if size % 2 == 0 {
            return Err(MorphologyError::EvenSizedKernel(size, size));
        }

        let c = size / 2;
        let data = (0..size * size)
            .map(|i| match shape {
                KernelShape::Box { .. } => true,
                KernelShape::Cross { .. } => i / size == c || i % size == c,
            })
            .collect();

        Ok(Self {
            data,
            width: size,
            height: size,
        })
    }

    /// Create a kernel from a row-major mask.
    pub fn from_mask(data: Vec<bool>, width: usize, height: usize) -> Result<Self, MorphologyError> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(MorphologyError::EmptyKernel);
        }
        if width % 2 == 0 || height % 2 == 0 {
            return Err(MorphologyError::EvenSizedKernel(width, height));
        }
        if !data.iter().any(|&v| v) {
            return Err(MorphologyError::AllKernelElementsInactive);
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// The width of the kernel.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The height of the kernel.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The `(vertical, horizontal)` distance from the center to the kernel border.
    pub fn pad(&self) -> (usize, usize) {
        (self.height / 2, self.width / 2)
    }

    /// Offsets `(dx, dy)` of the active elements relative to the center.
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let (ph, pw) = self.pad();
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(|(i, _)| {
                (
                    (i % self.width) as isize - pw as isize,
                    (i / self.width) as isize - ph as isize,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_kernel() -> Result<(), MorphologyError> {
        let kernel = Kernel::new(KernelShape::Box { size: 5 })?;
        assert_eq!(kernel.offsets().len(), 25);
        assert_eq!(kernel.pad(), (2, 2));
        Ok(())
    }

    #[test]
    fn test_cross_kernel() -> Result<(), MorphologyError> {
        let kernel = Kernel::new(KernelShape::Cross { size: 3 })?;
        let offsets = kernel.offsets();
        assert_eq!(offsets, vec![(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)]);
        Ok(())
    }

    #[test]
    fn test_invalid_kernels() {
        assert_eq!(
            Kernel::new(KernelShape::Box { size: 4 }),
            Err(MorphologyError::EvenSizedKernel(4, 4))
        );
        assert_eq!(
            Kernel::new(KernelShape::Box { size: 0 }),
            Err(MorphologyError::EmptyKernel)
        );
        assert_eq!(
            Kernel::from_mask(vec![false; 9], 3, 3),
            Err(MorphologyError::AllKernelElementsInactive)
        );
    }
}
