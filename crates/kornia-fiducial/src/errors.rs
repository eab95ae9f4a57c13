use kornia_image::ImageError;
use kornia_imgproc::morphology::MorphologyError;

/// Errors that can occur when detecting or identifying fiducial markers.
#[derive(Debug, thiserror::Error)]
pub enum FiducialError {
    /// Error related to image.
    #[error(transparent)]
    ImageError(#[from] ImageError),

    /// Error raised by the binary post processing filter.
    #[error(transparent)]
    MorphologyError(#[from] MorphologyError),

    /// The input image has no pixels.
    #[error("the input image is empty")]
    InvalidInput,

    /// The quad color value is not one of the known colors.
    #[error("invalid quad color: {0}")]
    InvalidQuadColor(String),

    /// The matching metric name is unknown.
    #[error("invalid matching metric: {0}")]
    InvalidMetric(String),

    /// The post processing filter description is unknown.
    #[error("invalid post processing filter: {0}")]
    InvalidFilter(String),

    /// The matching dimension is outside `[4, 256]`.
    #[error("matching dim must be in [4, 256], got {0}")]
    InvalidMatchingDim(usize),

    /// The marker border ratio is not a number in `[0, 1]`.
    #[error("border ratio must be in [0, 1], got {0}")]
    InvalidBorderRatio(f32),

    /// Templates could not be loaded.
    #[error("failed to load templates: {0}")]
    TemplateLoad(String),
}

/// Reasons for the edge refinement to reject a quad candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RefineError {
    /// Refinement needs exactly four corners.
    #[error("expected 4 corners, got {0}")]
    InvalidCornerCount(usize),

    /// The first corner is not a point of the boundary.
    #[error("the first corner was not found in the boundary")]
    CornerNotInBoundary,

    /// Opposite edges are not parallel enough.
    #[error("opposite edges are not parallel enough")]
    NotRectangular,

    /// Two adjacent edges do not intersect.
    #[error("adjacent edges do not intersect")]
    DegenerateIntersection,
}
