//! Channel-average grayscale conversion

use image::{DynamicImage, Pixel, RgbImage, RgbaImage};
use tracing::debug;

/// Replaces red, green and blue with their truncated mean, keeping alpha
pub struct GrayscaleEnhancer;

impl GrayscaleEnhancer {
    /// Convert `image`, returning RGBA8 when the source carries alpha and RGB8 otherwise
    pub fn enhance(image: &DynamicImage) -> DynamicImage {
        debug!(
            color = ?image.color(),
            has_alpha = image.color().has_alpha(),
            "Averaging channels"
        );
        if image.color().has_alpha() {
            let mut rgba = image.to_rgba8();
            Self::average_rgba(&mut rgba);
            DynamicImage::ImageRgba8(rgba)
        } else {
            let mut rgb = image.to_rgb8();
            Self::average_rgb(&mut rgb);
            DynamicImage::ImageRgb8(rgb)
        }
    }

    pub fn average_rgb(image: &mut RgbImage) {
        for pixel in image.pixels_mut() {
            let g = channel_mean(pixel.channels());
            pixel.0 = [g, g, g];
        }
    }

    pub fn average_rgba(image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            let g = channel_mean(pixel.channels());
            let alpha = pixel.0[3];
            pixel.0 = [g, g, g, alpha];
        }
    }
}

/// `(r + g + b) / 3` with integer truncation
fn channel_mean(channels: &[u8]) -> u8 {
    let sum: u16 = channels.iter().take(3).map(|&c| u16::from(c)).sum();
    (sum / 3) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Luma, Rgb, Rgba};

    #[test]
    fn test_mean_truncates() {
        assert_eq!(channel_mean(&[1, 1, 2]), 1);
        assert_eq!(channel_mean(&[255, 255, 254]), 254);
        assert_eq!(channel_mean(&[0, 0, 2]), 0);
        assert_eq!(channel_mean(&[255, 255, 255]), 255);
    }

    #[test]
    fn test_rgb_channels_become_equal() {
        let source = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 77]));
        let out = GrayscaleEnhancer::enhance(&DynamicImage::ImageRgb8(source.clone()));
        let out = out.as_rgb8().unwrap();
        for (src, dst) in source.pixels().zip(out.pixels()) {
            let expected = ((u16::from(src[0]) + u16::from(src[1]) + u16::from(src[2])) / 3) as u8;
            assert_eq!(dst.0, [expected; 3]);
        }
    }

    #[test]
    fn test_alpha_is_untouched() {
        let source = RgbaImage::from_fn(4, 4, |x, y| Rgba([200, 100, 0, (x * 60 + y) as u8]));
        let out = GrayscaleEnhancer::enhance(&DynamicImage::ImageRgba8(source.clone()));
        let out = out.as_rgba8().unwrap();
        for (src, dst) in source.pixels().zip(out.pixels()) {
            assert_eq!(dst.0, [100, 100, 100, src[3]]);
        }
    }

    #[test]
    fn test_gray_input_is_a_fixed_point() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_fn(10, 3, |x, _| {
            let v = (x * 25) as u8;
            Rgb([v, v, v])
        }));
        let once = GrayscaleEnhancer::enhance(&source);
        assert_eq!(once, source);
        assert_eq!(GrayscaleEnhancer::enhance(&once), once);
    }

    #[test]
    fn test_luma_input_is_widened_to_rgb() {
        let source = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 2, Luma([42])));
        let out = GrayscaleEnhancer::enhance(&source);
        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.as_rgb8().unwrap().get_pixel(2, 1), &Rgb([42, 42, 42]));
    }
}
