//! Face detection
//!
//! [`FaceDetector`] is the seam the face-masking enhancer talks to. The
//! built-in implementation is a Viola-Jones evaluator over OpenCV Haar
//! cascade files ([`HaarCascade`]). With the `opencv` feature the same files
//! can be run through OpenCV itself ([`OpenCvCascade`]).

pub mod cascade;
pub mod detector;
pub mod grouping;
#[cfg(feature = "opencv")]
pub mod opencv_backend;

pub use cascade::{CascadeError, HaarCascade};
pub use detector::{GROUP_EPS, MIN_NEIGHBORS, SCALE_FACTOR};
pub use grouping::group_rectangles;
#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvCascade;

use crate::types::FaceRegion;
use image::GrayImage;

// Generated by build.rs from assets/
include!(concat!(env!("OUT_DIR"), "/bundled_cascade.rs"));

/// Text of the cascade compiled into the binary, if one was present at build time
pub fn bundled_cascade() -> Option<&'static str> {
    BUNDLED_CASCADE
}

/// Finds face rectangles in a single-channel image
pub trait FaceDetector: Send + Sync {
    /// Regions are reported in the coordinates of `gray`
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion>;
}

impl<T: FaceDetector + ?Sized> FaceDetector for Box<T> {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        (**self).detect(gray)
    }
}
