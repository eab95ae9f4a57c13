#![deny(missing_docs)]
//! # Kornia Fiducial
//!
//! Detection of square fiducial markers in grayscale images and their identification
//! against a library of reference templates.

/// Error types for marker detection.
pub mod errors;

/// Quad candidates and edge refinement.
pub mod quad;

/// Recovery of quads from boundaries with more than four corners.
pub mod heuristics;

/// Per frame quad detection.
pub mod detector;

/// Rotation invariant template matching.
pub mod matcher;

/// Template sources.
pub mod templates;

/// Numeric inversion of lens distortion models.
pub mod undistort;

/// End to end marker detection.
pub mod pipeline;

pub use crate::detector::{MaskSize, PostFilter, QuadColor, QuadDetector, QuadDetectorConfig};
pub use crate::errors::{FiducialError, RefineError};
pub use crate::heuristics::CornerHeuristics;
pub use crate::matcher::{
    create_marker_image, MarkerMatcher, MarkerTemplate, MatchMetric, MatchResult, MatcherConfig,
    TemplateSelector, REJECTED_ID,
};
pub use crate::pipeline::{Fiducial, FiducialDetector, FiducialDetectorConfig};
pub use crate::quad::{refine_edges, TiltedQuad};
pub use crate::templates::{InMemoryTemplateLoader, TemplateLoader};
pub use crate::undistort::{
    InverseDistortionSolver, ParallelBackend, SequentialBackend, SolverBackend, SolverBackendKind,
    SolverConfig,
};
