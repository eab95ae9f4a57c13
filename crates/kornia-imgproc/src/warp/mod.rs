//! Geometric image transformations using perspective warps.
//!
//! This module rectifies a quadrilateral image region into an axis-aligned patch.

mod perspective;

pub use perspective::{rectify_quad, square_to_quad_transform, transform_point, RectifyError};
