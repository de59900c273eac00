//! Error types for image enhancement operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for enhancement operations
pub type Result<T> = std::result::Result<T, EnhanceError>;

/// Process exit code for argument errors
pub const EXIT_BAD_ARGUMENTS: u8 = 1;
/// Process exit code for inputs whose content type is not allow-listed
pub const EXIT_UNSUPPORTED_FORMAT: u8 = 2;
/// Process exit code for any failure while reading, enhancing or writing
pub const EXIT_PROCESSING_FAILURE: u8 = 3;

/// Error taxonomy for the enhancement pipeline
#[derive(Error, Debug)]
pub enum EnhanceError {
    /// No source image path was supplied
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Content sniffing found a type outside the allow-list
    #[error("File format \"{detected}\" is not supported for image enhancement ({})", .path.display())]
    UnsupportedFormat {
        /// Canonical extension (or media type when there is none) that was detected
        detected: String,
        /// Offending input file
        path: PathBuf,
    },

    /// Input file could not be opened or read
    #[error("Unreadable input '{}': {source}", .path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input bytes are not a decodable raster image
    #[error("Failed to decode image '{}': {source}", .path.display())]
    ImageDecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Cascade definition could not be read or parsed
    #[error("Failed to load face detector from '{}': {reason}", .path.display())]
    DetectorLoadFailure { path: PathBuf, reason: String },

    /// Enhanced image could not be written
    #[error("Failed to write '{}': {reason}", .path.display())]
    OutputWriteFailure { path: PathBuf, reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EnhanceError {
    /// Create a new missing argument error
    pub fn missing_argument<S: Into<String>>(msg: S) -> Self {
        Self::MissingArgument(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>, P: AsRef<Path>>(detected: S, path: P) -> Self {
        Self::UnsupportedFormat {
            detected: detected.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a new unreadable input error
    pub fn unreadable_input<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::UnreadableInput {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new decode failure error
    pub fn image_decode<P: AsRef<Path>>(path: P, source: image::ImageError) -> Self {
        Self::ImageDecodeFailure {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new detector load error
    pub fn detector_load<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::DetectorLoadFailure {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new output write error
    pub fn output_write<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::OutputWriteFailure {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Exit status the CLI reports for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingArgument(_) | Self::InvalidConfig(_) => EXIT_BAD_ARGUMENTS,
            Self::UnsupportedFormat { .. } => EXIT_UNSUPPORTED_FORMAT,
            Self::UnreadableInput { .. }
            | Self::ImageDecodeFailure { .. }
            | Self::DetectorLoadFailure { .. }
            | Self::OutputWriteFailure { .. } => EXIT_PROCESSING_FAILURE,
        }
    }
}
