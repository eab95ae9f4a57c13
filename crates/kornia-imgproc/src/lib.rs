#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
/// lens distortion module.
pub mod calibration;

/// curvature scale space corner detection on closed contours.
pub mod corners;

/// image filtering module.
pub mod filter;

/// morphological operations module.
pub mod morphology;

/// module containing parallization utilities.
pub mod parallel;

/// connected component labelling and boundary tracing.
pub mod regions;

/// image resizing module.
pub mod resize;

/// quarter turn image rotation.
pub mod rotate;

/// image thresholding module.
pub mod threshold;

/// image geometric transformations module.
pub mod warp;
