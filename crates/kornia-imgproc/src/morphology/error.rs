/// Errors related to morphological operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MorphologyError {
    /// The provided kernel is empty.
    #[error("the kernel is empty")]
    EmptyKernel,
    /// The kernel must have odd dimensions.
    #[error("the kernel size must be odd, got {0}x{1}")]
    EvenSizedKernel(usize, usize),
    /// All elements in the kernel are inactive.
    #[error("all elements in the kernel are inactive")]
    AllKernelElementsInactive,
    /// Source and destination images differ in size.
    #[error(transparent)]
    Image(#[from] kornia_image::ImageError),
}
