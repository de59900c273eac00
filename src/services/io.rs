//! Image I/O operations service
//!
//! Keeps file handling out of the enhancers: decoding, TIFF encoding and the
//! `ENHANCED_` output naming rules live here.

use crate::error::{EnhanceError, Result};
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Prefix put in front of every output file name
pub const OUTPUT_PREFIX: &str = "ENHANCED_";

/// Extension used by the face-masking output
pub const TIFF_EXTENSION: &str = "tif";

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image, detecting the format from its content
    ///
    /// Pixels come back in stored order; any EXIF orientation is ignored.
    ///
    /// # Errors
    /// - `UnreadableInput` when the file cannot be read
    /// - `ImageDecodeFailure` when the bytes are not a decodable raster image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use image_enhance::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = read_input(path_ref)?;
        let image =
            image::load_from_memory(&data).map_err(|e| EnhanceError::image_decode(path_ref, e))?;
        log_decoded(path_ref, &image, data.len());
        Ok(image)
    }

    /// Load an image and turn it upright according to its EXIF orientation
    ///
    /// # Errors
    /// - `UnreadableInput` when the file cannot be read
    /// - `ImageDecodeFailure` when the bytes are not a decodable raster image
    pub fn load_image_oriented<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = read_input(path_ref)?;
        let image = decode_oriented(&data).map_err(|e| EnhanceError::image_decode(path_ref, e))?;
        log_decoded(path_ref, &image, data.len());
        Ok(image)
    }

    /// Encode `image` as TIFF at `path`, whatever the path's extension says
    ///
    /// # Errors
    /// - `OutputWriteFailure` when the directory cannot be created or encoding/writing fails
    pub fn save_tiff<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                EnhanceError::output_write(parent, format!("cannot create directory: {e}"))
            })?;
        }

        image
            .save_with_format(path_ref, ImageFormat::Tiff)
            .map_err(|e| EnhanceError::output_write(path_ref, e.to_string()))?;

        log::debug!(
            "Wrote {:?} TIFF {}x{} to {}",
            image.color(),
            image.width(),
            image.height(),
            path_ref.display()
        );
        Ok(())
    }

    /// Make `path` absolute against the current directory without touching the filesystem
    ///
    /// # Errors
    /// - `UnreadableInput` when the current directory cannot be determined
    pub fn absolute<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
        let path_ref = path.as_ref();
        if path_ref.is_absolute() {
            return Ok(path_ref.to_path_buf());
        }
        let cwd = std::env::current_dir().map_err(|e| EnhanceError::unreadable_input(path_ref, e))?;
        Ok(cwd.join(path_ref))
    }

    /// `<dir>/ENHANCED_<stem>.tif`
    ///
    /// # Errors
    /// - `InvalidConfig` when `input` has no file name
    ///
    /// # Examples
    /// ```rust
    /// use image_enhance::services::ImageIOService;
    /// use std::path::Path;
    ///
    /// let out = ImageIOService::face_mask_output_path("/a/b/photo.jpg").unwrap();
    /// assert_eq!(out, Path::new("/a/b/ENHANCED_photo.tif"));
    /// ```
    pub fn face_mask_output_path<P: AsRef<Path>>(input: P) -> Result<PathBuf> {
        let input = input.as_ref();
        let stem = input.file_stem().ok_or_else(|| no_file_name(input))?;
        let mut name = std::ffi::OsString::from(OUTPUT_PREFIX);
        name.push(stem);
        name.push(".");
        name.push(TIFF_EXTENSION);
        Ok(parent_dir(input).join(name))
    }

    /// `<dir>/ENHANCED_<file name>`, keeping the original extension and case
    ///
    /// # Errors
    /// - `InvalidConfig` when `input` has no file name
    ///
    /// # Examples
    /// ```rust
    /// use image_enhance::services::ImageIOService;
    /// use std::path::Path;
    ///
    /// let out = ImageIOService::grayscale_output_path("/a/b/photo.jpg").unwrap();
    /// assert_eq!(out, Path::new("/a/b/ENHANCED_photo.jpg"));
    /// ```
    pub fn grayscale_output_path<P: AsRef<Path>>(input: P) -> Result<PathBuf> {
        let input = input.as_ref();
        let file_name = input.file_name().ok_or_else(|| no_file_name(input))?;
        let mut name = std::ffi::OsString::from(OUTPUT_PREFIX);
        name.push(file_name);
        Ok(parent_dir(input).join(name))
    }
}

fn parent_dir(input: &Path) -> PathBuf {
    input.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| EnhanceError::unreadable_input(path, e))
}

fn decode_oriented(data: &[u8]) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

fn log_decoded(path: &Path, image: &DynamicImage, bytes: usize) {
    log::debug!(
        "Decoded {} ({}x{}, {:?}, {} bytes)",
        path.display(),
        image.width(),
        image.height(),
        image.color(),
        bytes
    );
}

fn no_file_name(input: &Path) -> EnhanceError {
    EnhanceError::invalid_config(format!("'{}' does not name a file", input.display()))
}
