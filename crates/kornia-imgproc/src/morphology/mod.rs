/// Error types used for morphological operations.
pub mod error;
pub use error::MorphologyError;

/// Kernel (structuring element) utilities.
pub mod kernels;
pub use kernels::{Kernel, KernelShape};

/// Dilation, erosion, opening and closing.
pub mod ops;
pub use ops::{close, dilate, erode, open};
