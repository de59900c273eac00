//! Core types for enhancement operations

use crate::config::EnhanceMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned rectangle around a detected face, in pixels of the buffer it was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRegion {
    /// Create a new face region
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Result of content-based media type detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniffedType {
    /// Media type, e.g. `image/jpeg` or `text/plain`
    pub mime: String,
    /// Canonical extension without the leading dot, empty when the type has none
    pub extension: String,
}

impl SniffedType {
    pub fn new<M: Into<String>, E: Into<String>>(mime: M, extension: E) -> Self {
        Self {
            mime: mime.into(),
            extension: extension.into(),
        }
    }

    /// Label used in log lines and error messages
    pub fn label(&self) -> &str {
        if self.extension.is_empty() {
            &self.mime
        } else {
            &self.extension
        }
    }
}

impl std::fmt::Display for SniffedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.mime)
    }
}

/// Timing breakdown for a single enhancement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Content sniffing time
    pub sniff_ms: u64,
    /// Image decode time
    pub decode_ms: u64,
    /// Detection, masking and pixel conversion time
    pub enhance_ms: u64,
    /// TIFF encode and write time
    pub save_ms: u64,
}

impl ProcessingTimings {
    pub fn total_ms(&self) -> u64 {
        self.sniff_ms + self.decode_ms + self.enhance_ms + self.save_ms
    }
}

/// Outcome of enhancing one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementResult {
    /// Where the enhanced TIFF was written
    pub output_path: PathBuf,
    /// Which enhancer produced the output
    pub mode: EnhanceMode,
    /// Content type detected for the source
    pub source_type: SniffedType,
    /// Output dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Number of face regions painted over
    pub faces_masked: usize,
    /// Clockwise quarter turns applied before masking (0 for the grayscale path)
    pub quarter_turns: u8,
    pub timings: ProcessingTimings,
}
