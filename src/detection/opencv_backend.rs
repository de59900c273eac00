//! OpenCV-backed cascade detector
//!
//! Runs the same cascade files through `cv::CascadeClassifier::detectMultiScale`
//! with OpenCV's default parameters. The bundled cascade is written to a
//! temporary file first because OpenCV only loads cascades from disk.

use super::FaceDetector;
use crate::config::CascadeLocation;
use crate::error::{EnhanceError, Result};
use crate::types::FaceRegion;
use image::GrayImage;
use opencv::core::{Mat, Rect, Scalar, Size, Vector, CV_8UC1};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// `detectMultiScale` defaults
const SCALE_FACTOR: f64 = 1.1;
const MIN_NEIGHBORS: i32 = 3;

/// [`FaceDetector`] backed by OpenCV's `CascadeClassifier`
pub struct OpenCvCascade {
    // detectMultiScale needs &mut self
    classifier: Mutex<CascadeClassifier>,
}

impl OpenCvCascade {
    /// Load a cascade XML file
    ///
    /// # Errors
    /// - `DetectorLoadFailure` when OpenCV cannot load the file or loads an empty classifier
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .to_str()
            .ok_or_else(|| EnhanceError::detector_load(path, "path is not valid UTF-8"))?;
        let classifier =
            CascadeClassifier::new(name).map_err(|e| EnhanceError::detector_load(path, e.to_string()))?;
        if classifier
            .empty()
            .map_err(|e| EnhanceError::detector_load(path, e.to_string()))?
        {
            return Err(EnhanceError::detector_load(path, "OpenCV loaded an empty classifier"));
        }
        debug!(path = %path.display(), "Loaded OpenCV cascade classifier");
        Ok(Self {
            classifier: Mutex::new(classifier),
        })
    }

    /// Load a resolved cascade, extracting the bundled copy to a temporary file
    ///
    /// # Errors
    /// - `DetectorLoadFailure` when the definition cannot be written or loaded
    pub fn from_location(location: &CascadeLocation) -> Result<Self> {
        match location {
            CascadeLocation::File(path) => Self::from_file(path),
            CascadeLocation::Bundled => {
                let label = location.display_path();
                let xml = super::bundled_cascade()
                    .ok_or_else(|| EnhanceError::detector_load(&label, "no cascade was bundled at build time"))?;
                let mut temp = tempfile::Builder::new()
                    .prefix("haarcascade")
                    .suffix(".xml")
                    .tempfile()
                    .map_err(|e| EnhanceError::detector_load(&label, e.to_string()))?;
                temp.write_all(xml.as_bytes())
                    .and_then(|()| temp.flush())
                    .map_err(|e| EnhanceError::detector_load(&label, e.to_string()))?;
                // The temporary file is removed when `temp` drops
                Self::from_file(temp.path())
            },
        }
    }

    fn to_mat(gray: &GrayImage) -> opencv::Result<Mat> {
        let (width, height) = gray.dimensions();
        let mut mat = Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC1, Scalar::all(0.0))?;
        mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
        Ok(mat)
    }

    fn run(&self, gray: &GrayImage) -> opencv::Result<Vec<FaceRegion>> {
        let mat = Self::to_mat(gray)?;
        let mut found = Vector::<Rect>::new();
        let mut classifier = match self.classifier.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        classifier.detect_multi_scale(
            &mat,
            &mut found,
            SCALE_FACTOR,
            MIN_NEIGHBORS,
            0,
            Size::new(0, 0),
            Size::new(0, 0),
        )?;
        Ok(found
            .iter()
            .map(|r| FaceRegion::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

impl FaceDetector for OpenCvCascade {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        match self.run(gray) {
            Ok(faces) => {
                debug!(
                    width = gray.width(),
                    height = gray.height(),
                    faces = faces.len(),
                    "OpenCV detection finished"
                );
                faces
            },
            Err(e) => {
                warn!(error = %e, "OpenCV detection failed, masking nothing");
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::cascade::tests::DARK_CENTER_CASCADE;
    use image::Luma;

    #[test]
    fn test_missing_file_is_a_load_failure() {
        let err = OpenCvCascade::from_file("/nonexistent/haarcascade.xml")
            .err()
            .unwrap();
        assert!(matches!(err, EnhanceError::DetectorLoadFailure { .. }));
    }

    #[test]
    fn test_blank_image_has_no_faces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dark_center.xml");
        std::fs::write(&path, DARK_CENTER_CASCADE).unwrap();
        let detector = OpenCvCascade::from_file(&path).unwrap();
        let image = GrayImage::from_pixel(120, 90, Luma([200]));
        assert!(detector.detect(&image).is_empty());
    }

    #[test]
    fn test_mat_copy_keeps_layout() {
        let image = GrayImage::from_fn(7, 3, |x, y| Luma([(x * 10 + y) as u8]));
        let mat = OpenCvCascade::to_mat(&image).unwrap();
        assert_eq!((mat.rows(), mat.cols()), (3, 7));
        assert_eq!(*mat.at_2d::<u8>(2, 6).unwrap(), 62);
    }
}
