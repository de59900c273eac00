//! Face masking enhancement
//!
//! Detect faces (turning the image a quarter at a time when none are found
//! upright), paint a black box over each one with a fixed margin, sharpen
//! with an unsharp mask and reduce to luminance.

use crate::detection::FaceDetector;
use crate::types::FaceRegion;
use crate::utils::{luma_bt601, luma_bt601_swapped, rotate_cw, unsharp_mask};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use tracing::{debug, info, instrument};

/// Pixels added to the left of a detected face
pub const MASK_MARGIN_LEFT: i32 = 30;
/// Pixels added above a detected face
pub const MASK_MARGIN_TOP: i32 = 50;
/// Pixels added to the right of a detected face
pub const MASK_MARGIN_RIGHT: i32 = 20;
/// Pixels added below a detected face
pub const MASK_MARGIN_BOTTOM: i32 = 40;

/// Gaussian sigma of the unsharp mask
pub const SHARPEN_SIGMA: f64 = 5.0;

/// Quarter turns tried after the upright detection comes back empty
pub const MAX_ROTATION_ATTEMPTS: u8 = 4;

/// Result of a face-masking pass
#[derive(Debug, Clone)]
pub struct FaceMaskOutcome {
    /// Sharpened single-channel image, in the orientation the faces were found in
    pub image: GrayImage,
    /// Regions that were masked
    pub faces: Vec<FaceRegion>,
    /// Clockwise quarter turns applied to the working buffer (`4` means every attempt came back empty)
    pub quarter_turns: u8,
}

/// Masks faces found by a [`FaceDetector`]
pub struct FaceMaskEnhancer<'a> {
    detector: &'a dyn FaceDetector,
}

impl<'a> FaceMaskEnhancer<'a> {
    pub fn new(detector: &'a dyn FaceDetector) -> Self {
        Self { detector }
    }

    /// Run detection, masking, sharpening and grayscale conversion
    #[instrument(skip(self, image), fields(dimensions = %format!("{}x{}", image.width(), image.height())))]
    pub fn enhance(&self, image: &DynamicImage) -> FaceMaskOutcome {
        let (mut working, faces, quarter_turns) = self.find_faces(image.to_rgb8());

        if faces.is_empty() {
            info!(
                attempts = quarter_turns + 1,
                "No face found at any orientation, nothing will be masked"
            );
        } else {
            info!(faces = faces.len(), quarter_turns, "🙂 Masking detected faces");
        }

        mask_faces(&mut working, &faces);
        let image = sharpen_to_gray(&working);

        FaceMaskOutcome {
            image,
            faces,
            quarter_turns,
        }
    }

    /// Detect upright first, then keep turning the working buffer clockwise until a face shows up
    fn find_faces(&self, mut working: RgbImage) -> (RgbImage, Vec<FaceRegion>, u8) {
        let mut faces = self.detector.detect(&luma_bt601(&working));
        let mut quarter_turns = 0;

        while faces.is_empty() && quarter_turns < MAX_ROTATION_ATTEMPTS {
            working = rotate_cw(&working, 90.0);
            quarter_turns += 1;
            faces = self.detector.detect(&luma_bt601(&working));
            debug!(
                rotation = u32::from(quarter_turns) * 90,
                faces = faces.len(),
                "Retried detection on rotated image"
            );
        }

        (working, faces, quarter_turns)
    }
}

/// Paint an opaque black box over every face, widened by the fixed margins
///
/// Boxes run from `(x - 30, y - 50)` to `(x + w + 20, y + h + 40)` inclusive and
/// are clipped to the image. Overlapping boxes simply overwrite each other.
pub fn mask_faces(image: &mut RgbImage, faces: &[FaceRegion]) {
    for face in faces {
        let width = face.width + MASK_MARGIN_LEFT + MASK_MARGIN_RIGHT + 1;
        let height = face.height + MASK_MARGIN_TOP + MASK_MARGIN_BOTTOM + 1;
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            continue;
        };
        if width == 0 || height == 0 {
            continue;
        }
        let rect = Rect::at(face.x - MASK_MARGIN_LEFT, face.y - MASK_MARGIN_TOP).of_size(width, height);
        draw_filled_rect_mut(image, rect, Rgb([0, 0, 0]));
    }
}

/// Unsharp mask followed by luminance with red and blue weights exchanged
pub fn sharpen_to_gray(image: &RgbImage) -> GrayImage {
    luma_bt601_swapped(&unsharp_mask(image, SHARPEN_SIGMA))
}
