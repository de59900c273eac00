//! Shared pixel-level utilities
//!
//! Rotation and filtering helpers used by the enhancers and the face detector.

pub mod filters;
pub mod rotation;

pub use filters::{add_weighted, gaussian_blur, luma_bt601, luma_bt601_swapped, unsharp_mask};
pub use rotation::{rotate_cw, transpose};
