#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Image Enhance
//!
//! Convert an image to a grayscale TIFF, optionally masking faces first.
//!
//! Two strategies share one entry point:
//!
//! - **Grayscale**: every pixel's red, green and blue become their truncated
//!   mean, alpha is kept, and the result is written as TIFF next to the source
//!   as `ENHANCED_<file name>` (the original extension stays in the name).
//! - **Face masking**: faces are found with an OpenCV Haar cascade (the image
//!   is turned a quarter at a time, up to four times, when none are found
//!   upright), covered with black boxes, sharpened with an unsharp mask and
//!   reduced to luminance. The result is written as `ENHANCED_<stem>.tif`.
//!
//! The input type is detected from content, never from the extension; only
//! JPEG, PNG, TIFF and BMP are accepted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use image_enhance::{enhance_file, EnhanceConfig, EnhanceMode};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = EnhanceConfig::builder()
//!     .mode(EnhanceMode::FaceMask)
//!     .cascade_path("assets/haarcascade_frontalface_alt_tree.xml")
//!     .build()?;
//! let result = enhance_file("photos/portrait.jpg", &config)?;
//! println!("{} ({} faces masked)", result.output_path.display(), result.faces_masked);
//! # Ok(())
//! # }
//! ```
//!
//! ## Reusing a detector
//!
//! [`EnhanceProcessor`] loads the cascade once and keeps it for every file it
//! processes. Any [`FaceDetector`] can be injected instead:
//!
//! ```rust,no_run
//! use image_enhance::{EnhanceConfig, EnhanceMode, EnhanceProcessor, HaarCascade};
//!
//! # fn example() -> anyhow::Result<()> {
//! let cascade = HaarCascade::from_file("haarcascade_frontalface_default.xml")?;
//! let config = EnhanceConfig::builder().mode(EnhanceMode::FaceMask).build()?;
//! let processor = EnhanceProcessor::with_detector(config, Box::new(cascade))?;
//! for path in ["a.jpg", "b.png"] {
//!     processor.process_file(path)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `opencv`: run cascades through OpenCV's `CascadeClassifier`
//!   ([`DetectorBackend::OpenCv`]); needs a system OpenCV
//! - `tracing-json`: JSON log output for the CLI
//!
//! When `assets/haarcascade_frontalface_alt_tree.xml` exists at build time it
//! is compiled in and used whenever no cascade file is found at run time.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod detection;
pub mod enhancers;
pub mod error;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::path::Path;

// Public API exports
pub use config::{
    CascadeLocation, CascadeSource, DetectorBackend, EnhanceConfig, EnhanceConfigBuilder, EnhanceMode,
};
pub use detection::{bundled_cascade, CascadeError, FaceDetector, HaarCascade};
#[cfg(feature = "opencv")]
pub use detection::OpenCvCascade;
pub use enhancers::{FaceMaskEnhancer, FaceMaskOutcome, GrayscaleEnhancer};
pub use error::{EnhanceError, Result};
pub use processor::EnhanceProcessor;
pub use services::{ImageIOService, TypeSniffer};
pub use types::{EnhancementResult, FaceRegion, ProcessingTimings, SniffedType};
pub use utils::rotate_cw;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, init_library_tracing, TracingConfig, TracingFormat};

/// Enhance one image file with a one-off processor
///
/// The output is written next to the source; see [`EnhanceMode`] for the
/// naming of each strategy.
///
/// # Examples
///
/// ```rust,no_run
/// use image_enhance::{enhance_file, EnhanceConfig};
///
/// let result = enhance_file("scan.png", &EnhanceConfig::default())?;
/// assert!(result.output_path.ends_with("ENHANCED_scan.png"));
/// # Ok::<(), image_enhance::EnhanceError>(())
/// ```
pub fn enhance_file<P: AsRef<Path>>(path: P, config: &EnhanceConfig) -> Result<EnhancementResult> {
    EnhanceProcessor::new(config.clone())?.process_file(path)
}
