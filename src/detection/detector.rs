//! Multi-scale sliding-window evaluation of a [`HaarCascade`]

use super::cascade::{HaarCascade, HaarFeature, Stage, WeakClassifier};
use super::grouping::group_rectangles;
use super::FaceDetector;
use crate::types::FaceRegion;
use image::{imageops, GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use tracing::{debug, trace};

/// Image pyramid step between scales
pub const SCALE_FACTOR: f64 = 1.1;
/// Raw hits a cluster needs beyond this count to be reported
pub const MIN_NEIGHBORS: usize = 3;
/// Relative tolerance used when clustering raw hits
pub const GROUP_EPS: f64 = 0.2;

/// Summed-area tables for pixel values and their squares
struct IntegralImage {
    sum: Image<Luma<u64>>,
    sq_sum: Image<Luma<u64>>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(image),
            sq_sum: integral_squared_image::<_, u64>(image),
        }
    }

    fn rect(table: &Image<Luma<u64>>, x: usize, y: usize, w: usize, h: usize) -> i64 {
        if w == 0 || h == 0 {
            return 0;
        }
        let (left, top) = (x as u32, y as u32);
        let (right, bottom) = ((x + w - 1) as u32, (y + h - 1) as u32);
        sum_image_pixels(table, left, top, right, bottom)[0] as i64
    }

    fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::rect(&self.sum, x, y, w, h)
    }

    fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::rect(&self.sq_sum, x, y, w, h)
    }
}

/// Evaluation context for one window position
struct Window<'a> {
    integral: &'a IntegralImage,
    x: usize,
    y: usize,
    inv_norm: f64,
}

impl<'a> Window<'a> {
    fn new(integral: &'a IntegralImage, x: usize, y: usize, width: usize, height: usize) -> Self {
        // Contrast normalisation over the window shrunk by one pixel per side
        let (nw, nh) = (width.saturating_sub(2), height.saturating_sub(2));
        let area = (nw * nh) as f64;
        let sum = integral.rect_sum(x + 1, y + 1, nw, nh) as f64;
        let sq_sum = integral.rect_sq_sum(x + 1, y + 1, nw, nh) as f64;
        let nf = area * sq_sum - sum * sum;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };
        Self {
            integral,
            x,
            y,
            inv_norm: 1.0 / nf,
        }
    }

    fn feature(&self, feature: &HaarFeature) -> f64 {
        let total: f64 = feature
            .rects
            .iter()
            .map(|r| {
                let s = self.integral.rect_sum(
                    self.x + r.x as usize,
                    self.y + r.y as usize,
                    r.width as usize,
                    r.height as usize,
                );
                r.weight * s as f64
            })
            .sum();
        total * self.inv_norm
    }
}

impl HaarCascade {
    fn classifier_vote(&self, window: &Window<'_>, classifier: &WeakClassifier) -> f64 {
        let mut index = 0_i32;
        loop {
            let Some(node) = classifier.nodes.get(index as usize) else {
                return 0.0;
            };
            let value = self
                .features
                .get(node.feature)
                .map_or(0.0, |f| window.feature(f));
            index = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            if index <= 0 {
                break;
            }
        }
        classifier
            .leaves
            .get(index.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0.0)
    }

    fn stage_passes(&self, window: &Window<'_>, stage: &Stage) -> bool {
        let sum: f64 = stage
            .classifiers
            .iter()
            .map(|c| self.classifier_vote(window, c))
            .sum();
        sum >= stage.threshold
    }

    /// `1` when the window is accepted, otherwise minus the index of the rejecting stage
    fn run_at(&self, window: &Window<'_>) -> i32 {
        if !self.is_tree {
            for (index, stage) in self.stages.iter().enumerate() {
                if !self.stage_passes(window, stage) {
                    return -(index as i32);
                }
            }
            return 1;
        }

        let mut current = 0_usize;
        loop {
            let Some(stage) = self.stages.get(current) else {
                return 1;
            };
            if self.stage_passes(window, stage) {
                match stage.child {
                    Some(child) => current = child,
                    None => return 1,
                }
                continue;
            }

            // Rejected: try the next sibling, climbing towards the root
            let mut cursor = Some(current);
            let mut sibling = None;
            while let Some(index) = cursor {
                let Some(node) = self.stages.get(index) else {
                    break;
                };
                if let Some(next) = node.next {
                    sibling = Some(next);
                    break;
                }
                cursor = node.parent;
            }
            match sibling {
                Some(next) => current = next,
                None => return -(current as i32),
            }
        }
    }

    /// Slide the cascade over every scale of the image and return raw hits in image coordinates
    pub fn detect_raw(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (image_width, image_height) = gray.dimensions();
        let (win_w, win_h) = (self.window_width, self.window_height);
        let mut hits = Vec::new();
        let mut factor = 1.0_f64;

        loop {
            let window_w = (f64::from(win_w) * factor).round() as u32;
            let window_h = (f64::from(win_h) * factor).round() as u32;
            if window_w > image_width || window_h > image_height {
                break;
            }
            let scaled_w = (f64::from(image_width) / factor).round() as u32;
            let scaled_h = (f64::from(image_height) / factor).round() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }

            let integral = if scaled_w == image_width && scaled_h == image_height {
                IntegralImage::new(gray)
            } else {
                let scaled = imageops::resize(gray, scaled_w, scaled_h, imageops::FilterType::Triangle);
                IntegralImage::new(&scaled)
            };

            let step = if factor > 2.0 { 1 } else { 2 };
            let max_x = (scaled_w - win_w) as usize;
            let max_y = (scaled_h - win_h) as usize;
            let before = hits.len();

            let mut y = 0;
            while y <= max_y {
                let mut x = 0;
                while x <= max_x {
                    let window = Window::new(&integral, x, y, win_w as usize, win_h as usize);
                    let result = self.run_at(&window);
                    if result > 0 {
                        hits.push(FaceRegion::new(
                            (x as f64 * factor).round() as i32,
                            (y as f64 * factor).round() as i32,
                            window_w as i32,
                            window_h as i32,
                        ));
                    }
                    if result == 0 {
                        x += step;
                    }
                    x += step;
                }
                y += step;
            }

            trace!(
                factor = %format!("{factor:.3}"),
                scaled = %format!("{scaled_w}x{scaled_h}"),
                hits = hits.len() - before,
                "Scanned scale"
            );
            factor *= SCALE_FACTOR;
        }

        hits
    }
}

impl FaceDetector for HaarCascade {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let raw = self.detect_raw(gray);
        let faces = group_rectangles(&raw, MIN_NEIGHBORS, GROUP_EPS);
        debug!(
            width = gray.width(),
            height = gray.height(),
            raw_hits = raw.len(),
            faces = faces.len(),
            "Haar cascade detection finished"
        );
        faces
    }
}
