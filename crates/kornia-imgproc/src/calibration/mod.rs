/// lens distortion model.
pub mod distortion;

pub use distortion::DistortionModel;
