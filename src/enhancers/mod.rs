//! The two enhancement strategies
//!
//! Both work on in-memory images and leave file handling to
//! [`crate::services::ImageIOService`].

pub mod face_mask;
pub mod grayscale;

pub use face_mask::{mask_faces, sharpen_to_gray, FaceMaskEnhancer, FaceMaskOutcome};
pub use grayscale::GrayscaleEnhancer;
