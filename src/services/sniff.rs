//! Content-based media type detection
//!
//! The file name is never consulted: a text file called `photo.jpg` is
//! reported as text.

use crate::error::{EnhanceError, Result};
use crate::types::SniffedType;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes inspected from the start of a file
pub const SNIFF_LEN: u64 = 8192;

/// Canonical extensions the enhancers accept, compared case-insensitively
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "tif", "tiff", "bmp", "png"];

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";

/// Service for detecting the true type of an input file
pub struct TypeSniffer;

impl TypeSniffer {
    /// Detect the media type of the file at `path`
    ///
    /// # Errors
    /// - `UnreadableInput` when the file cannot be opened or read
    pub fn sniff<P: AsRef<Path>>(path: P) -> Result<SniffedType> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EnhanceError::unreadable_input(path, e))?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN)
            .read_to_end(&mut head)
            .map_err(|e| EnhanceError::unreadable_input(path, e))?;

        let sniffed = Self::sniff_bytes(&head);
        log::debug!(
            "Sniffed {} as {} from {} bytes",
            path.display(),
            sniffed,
            head.len()
        );
        Ok(sniffed)
    }

    /// Detect the media type of an in-memory prefix
    pub fn sniff_bytes(head: &[u8]) -> SniffedType {
        if head.is_empty() {
            return SniffedType::new(OCTET_STREAM, "");
        }
        if let Ok(format) = image::guess_format(head) {
            let extension = format.extensions_str().first().copied().unwrap_or_default();
            return SniffedType::new(format.to_mime_type(), extension);
        }
        if looks_like_text(head) {
            return SniffedType::new(TEXT_PLAIN, "txt");
        }
        SniffedType::new(OCTET_STREAM, "")
    }

    /// Whether a sniffed type may be enhanced
    pub fn is_allowed(sniffed: &SniffedType) -> bool {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&sniffed.extension))
    }
}

/// UTF-8 without NUL bytes, tolerating a code point cut off by the prefix limit
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
