//! Enhancement processor
//!
//! [`EnhanceProcessor`] is the dispatcher: it sniffs the input, enforces the
//! allow-list, runs the enhancer selected by [`EnhanceConfig::mode`] and
//! writes the TIFF output. The face detector is loaded lazily on the first
//! face-masking run and reused afterwards.

use crate::{
    config::{CascadeLocation, DetectorBackend, EnhanceConfig, EnhanceMode},
    detection::{FaceDetector, HaarCascade},
    enhancers::{FaceMaskEnhancer, GrayscaleEnhancer},
    error::{EnhanceError, Result},
    services::{ImageIOService, TypeSniffer},
    types::{EnhancementResult, ProcessingTimings},
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info as trace_info, instrument, span, Level};

/// Runs enhancements for one configuration
pub struct EnhanceProcessor {
    config: EnhanceConfig,
    detector: OnceLock<Box<dyn FaceDetector>>,
}

impl EnhanceProcessor {
    /// Create a processor; the detector is loaded on first use
    ///
    /// # Errors
    /// - `InvalidConfig` when the configuration does not validate
    pub fn new(config: EnhanceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detector: OnceLock::new(),
        })
    }

    /// Create a processor that uses `detector` instead of loading a cascade
    ///
    /// # Errors
    /// - `InvalidConfig` when the configuration does not validate
    pub fn with_detector(config: EnhanceConfig, detector: Box<dyn FaceDetector>) -> Result<Self> {
        let processor = Self::new(config)?;
        // Freshly created, so the cell is empty
        let _ = processor.detector.set(detector);
        Ok(processor)
    }

    /// Get the configuration
    pub fn config(&self) -> &EnhanceConfig {
        &self.config
    }

    /// Whether a detector has been loaded or injected
    pub fn is_detector_loaded(&self) -> bool {
        self.detector.get().is_some()
    }

    /// Load the cascade on first use
    ///
    /// # Errors
    /// - `DetectorLoadFailure` when the cascade cannot be found or parsed
    pub fn detector(&self) -> Result<&dyn FaceDetector> {
        if let Some(detector) = self.detector.get() {
            return Ok(&**detector);
        }

        let location = self.config.cascade.resolve()?;
        let path = location.display_path();
        let _span = span!(
            Level::INFO,
            "detector_loading",
            path = %path.display(),
            backend = %self.config.backend
        )
        .entered();
        let start = Instant::now();
        let loaded = load_detector(self.config.backend, &location)?;
        info!(
            "Loaded {} face detector from {} in {}ms",
            self.config.backend,
            path.display(),
            start.elapsed().as_millis()
        );

        let detector = self.detector.get_or_init(|| loaded);
        Ok(&**detector)
    }

    /// Enhance the image file at `input_path` and write the result next to it
    ///
    /// # Errors
    /// - `UnreadableInput` when the input cannot be read
    /// - `UnsupportedFormat` when the content is not an allow-listed image type
    /// - `ImageDecodeFailure` when the image cannot be decoded
    /// - `DetectorLoadFailure` when face masking needs a cascade that cannot be loaded
    /// - `OutputWriteFailure` when the output cannot be written
    #[instrument(skip(self, input_path), fields(input = %input_path.as_ref().display(), mode = %self.config.mode))]
    pub fn process_file<P: AsRef<Path>>(&self, input_path: P) -> Result<EnhancementResult> {
        let input = ImageIOService::absolute(input_path)?;
        let mut timings = ProcessingTimings::default();

        let sniff_start = Instant::now();
        let source_type = TypeSniffer::sniff(&input)?;
        timings.sniff_ms = elapsed_ms(sniff_start);
        if !TypeSniffer::is_allowed(&source_type) {
            return Err(EnhanceError::unsupported_format(source_type.label(), &input));
        }
        debug!("Detected {} for {}", source_type, input.display());

        // Face masking works on the image as displayed; grayscale keeps the stored pixels
        let decode_start = Instant::now();
        let image = match self.config.mode {
            EnhanceMode::FaceMask => ImageIOService::load_image_oriented(&input)?,
            EnhanceMode::Grayscale => ImageIOService::load_image(&input)?,
        };
        timings.decode_ms = elapsed_ms(decode_start);

        let (enhanced, output_path, faces_masked, quarter_turns) = match self.config.mode {
            EnhanceMode::FaceMask => {
                let detector = self.detector()?;
                let enhance_start = Instant::now();
                let outcome = FaceMaskEnhancer::new(detector).enhance(&image);
                timings.enhance_ms = elapsed_ms(enhance_start);
                (
                    DynamicImage::ImageLuma8(outcome.image),
                    ImageIOService::face_mask_output_path(&input)?,
                    outcome.faces.len(),
                    outcome.quarter_turns,
                )
            },
            EnhanceMode::Grayscale => {
                let enhance_start = Instant::now();
                let enhanced = GrayscaleEnhancer::enhance(&image);
                timings.enhance_ms = elapsed_ms(enhance_start);
                (enhanced, ImageIOService::grayscale_output_path(&input)?, 0, 0)
            },
        };

        let dimensions = (enhanced.width(), enhanced.height());
        let save_start = Instant::now();
        ImageIOService::save_tiff(&enhanced, &output_path)?;
        timings.save_ms = elapsed_ms(save_start);

        trace_info!(
            output = %output_path.display(),
            faces_masked,
            total_ms = timings.total_ms(),
            "Enhancement finished"
        );

        Ok(EnhancementResult {
            output_path,
            mode: self.config.mode,
            source_type,
            dimensions,
            faces_masked,
            quarter_turns,
            timings,
        })
    }

    /// Output path a run on `input_path` would write, without touching the file
    ///
    /// # Errors
    /// - `UnreadableInput` when a relative path cannot be resolved
    /// - `InvalidConfig` when the path has no file name
    pub fn output_path_for<P: AsRef<Path>>(&self, input_path: P) -> Result<PathBuf> {
        let input = ImageIOService::absolute(input_path)?;
        match self.config.mode {
            EnhanceMode::FaceMask => ImageIOService::face_mask_output_path(&input),
            EnhanceMode::Grayscale => ImageIOService::grayscale_output_path(&input),
        }
    }
}

fn load_detector(
    backend: DetectorBackend,
    location: &CascadeLocation,
) -> Result<Box<dyn FaceDetector>> {
    match backend {
        DetectorBackend::Native => Ok(Box::new(HaarCascade::from_location(location)?)),
        #[cfg(feature = "opencv")]
        DetectorBackend::OpenCv => Ok(Box::new(
            crate::detection::OpenCvCascade::from_location(location)?,
        )),
        #[cfg(not(feature = "opencv"))]
        DetectorBackend::OpenCv => Err(EnhanceError::detector_load(
            location.display_path(),
            "built without the opencv feature",
        )),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceRegion;
    use image::{GrayImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct CountingDetector {
        calls: Arc<AtomicUsize>,
        faces: Vec<FaceRegion>,
    }

    impl FaceDetector for CountingDetector {
        fn detect(&self, _gray: &GrayImage) -> Vec<FaceRegion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.faces.clone()
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_grayscale_run() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "photo.png");
        let processor = EnhanceProcessor::new(EnhanceConfig::default()).unwrap();

        let result = processor.process_file(&input).unwrap();
        assert_eq!(result.output_path, dir.path().join("ENHANCED_photo.png"));
        assert_eq!(result.mode, EnhanceMode::Grayscale);
        assert_eq!(result.source_type.extension, "png");
        assert_eq!(result.dimensions, (64, 48));
        assert_eq!(result.faces_masked, 0);
        assert!(result.output_path.exists());
        assert!(!processor.is_detector_loaded());
    }

    #[test]
    fn test_face_mask_run_uses_injected_detector() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "portrait.png");
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = CountingDetector {
            calls: Arc::clone(&calls),
            faces: vec![FaceRegion::new(20, 10, 10, 10)],
        };
        let config = EnhanceConfig::builder()
            .mode(EnhanceMode::FaceMask)
            .cascade_path("/nowhere/cascade.xml")
            .build()
            .unwrap();
        let processor = EnhanceProcessor::with_detector(config, Box::new(detector)).unwrap();

        let result = processor.process_file(&input).unwrap();
        assert_eq!(result.output_path, dir.path().join("ENHANCED_portrait.tif"));
        assert_eq!(result.faces_masked, 1);
        assert_eq!(result.quarter_turns, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let written = image::open(&result.output_path).unwrap();
        assert_eq!(written.color(), image::ColorType::L8);

        // Detector is reused across runs
        processor.process_file(&input).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsupported_content_is_rejected_before_decoding() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("notes.jpg");
        std::fs::write(&input, "shopping list").unwrap();
        let processor = EnhanceProcessor::new(EnhanceConfig::default()).unwrap();

        let err = processor.process_file(&input).unwrap_err();
        match err {
            EnhanceError::UnsupportedFormat { detected, path } => {
                assert_eq!(detected, "txt");
                assert_eq!(path, input);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("ENHANCED_notes.jpg").exists());
    }

    #[test]
    fn test_missing_cascade_fails_face_path_only() {
        let dir = tempdir().unwrap();
        let input = write_png(dir.path(), "photo.png");
        let config = EnhanceConfig::builder()
            .mode(EnhanceMode::FaceMask)
            .cascade_path(dir.path().join("missing.xml"))
            .build()
            .unwrap();
        let processor = EnhanceProcessor::new(config).unwrap();

        let err = processor.process_file(&input).unwrap_err();
        assert!(matches!(err, EnhanceError::DetectorLoadFailure { .. }));
        assert!(!dir.path().join("ENHANCED_photo.tif").exists());
    }

    #[test]
    fn test_output_path_for() {
        let processor = EnhanceProcessor::new(EnhanceConfig::default()).unwrap();
        assert_eq!(
            processor.output_path_for("/a/b/photo.jpg").unwrap(),
            PathBuf::from("/a/b/ENHANCED_photo.jpg")
        );
        let config = EnhanceConfig::builder().mode(EnhanceMode::FaceMask).build().unwrap();
        let processor = EnhanceProcessor::new(config).unwrap();
        assert_eq!(
            processor.output_path_for("/a/b/photo.jpg").unwrap(),
            PathBuf::from("/a/b/ENHANCED_photo.tif")
        );
    }
}
