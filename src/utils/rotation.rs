//! Clockwise image rotation
//!
//! Right-angle turns are built from a transpose followed by a flip so the
//! pixel layout matches the classic OpenCV recipe exactly. Any other angle
//! falls back to an affine rotation about the image centre.

use image::{imageops, ImageBuffer, Pixel};

type Buffer<P> = ImageBuffer<P, Vec<u8>>;

/// Rotate `image` clockwise by `degrees`
///
/// * `90` / `-270`: transpose, then flip about the vertical axis
/// * `270` / `-90`: transpose, then flip about the horizontal axis
/// * `180` / `-180`: flip about both axes
/// * `0` / `360` / `-360`: copy
/// * anything else: affine rotation by `360 - degrees` about the centre, same size
#[allow(clippy::float_cmp)]
pub fn rotate_cw<P>(image: &Buffer<P>, degrees: f64) -> Buffer<P>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if degrees == 270.0 || degrees == -90.0 {
        let mut rotated = transpose(image);
        imageops::flip_vertical_in_place(&mut rotated);
        rotated
    } else if degrees == 180.0 || degrees == -180.0 {
        imageops::rotate180(image)
    } else if degrees == 90.0 || degrees == -270.0 {
        let mut rotated = transpose(image);
        imageops::flip_horizontal_in_place(&mut rotated);
        rotated
    } else if degrees == 360.0 || degrees == 0.0 || degrees == -360.0 {
        image.clone()
    } else {
        rotate_about_center(image, 360.0 - degrees)
    }
}

/// Swap rows and columns
pub fn transpose<P>(image: &Buffer<P>) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(height, width, |x, y| *image.get_pixel(y, x))
}

/// Affine rotation by `angle` degrees counter-clockwise about the centre
///
/// Output keeps the source dimensions; samples that fall outside the source
/// are black. Bilinear interpolation.
fn rotate_about_center<P>(image: &Buffer<P>, angle: f64) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    let center_x = f64::from(width) / 2.0;
    let center_y = f64::from(height) / 2.0;

    // Forward matrix [[a, b, tx], [-b, a, ty]] maps source to destination.
    let radians = angle.to_radians();
    let a = radians.cos();
    let b = radians.sin();
    let tx = (1.0 - a) * center_x - b * center_y;
    let ty = b * center_x + (1.0 - a) * center_y;

    let channels = usize::from(P::CHANNEL_COUNT);
    let mut rotated: Buffer<P> = ImageBuffer::new(width, height);

    for (x, y, pixel) in rotated.enumerate_pixels_mut() {
        let dx = f64::from(x) - tx;
        let dy = f64::from(y) - ty;
        // Inverse of the orthonormal rotation part
        let src_x = a * dx - b * dy;
        let src_y = b * dx + a * dy;

        for (channel, value) in pixel.channels_mut().iter_mut().enumerate().take(channels) {
            *value = sample_bilinear(image, src_x, src_y, channel);
        }
    }

    rotated
}

fn sample_bilinear<P>(image: &Buffer<P>, x: f64, y: f64, channel: usize) -> u8
where
    P: Pixel<Subpixel = u8>,
{
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let tap = |px: i64, py: i64| -> f64 {
        if px < 0 || py < 0 || px >= i64::from(image.width()) || py >= i64::from(image.height()) {
            return 0.0;
        }
        image
            .get_pixel(px as u32, py as u32)
            .channels()
            .get(channel)
            .map_or(0.0, |v| f64::from(*v))
    };

    let top = tap(x0, y0) * (1.0 - fx) + tap(x0 + 1, y0) * fx;
    let bottom = tap(x0, y0 + 1) * (1.0 - fx) + tap(x0 + 1, y0 + 1) * fx;
    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 + y) as u8, (y * 13) as u8, (x * y) as u8])
        })
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let image = gradient(7, 5);
        assert_eq!(rotate_cw(&image, 0.0), image);
        assert_eq!(rotate_cw(&image, 360.0), image);
        assert_eq!(rotate_cw(&image, -360.0), image);
    }

    #[test]
    fn test_four_quarter_turns_are_identity() {
        let image = gradient(7, 5);
        let mut rotated = image.clone();
        for _ in 0..4 {
            rotated = rotate_cw(&rotated, 90.0);
        }
        assert_eq!(rotated, image);
    }

    #[test]
    fn test_quarter_then_three_quarter_is_identity() {
        let image = gradient(9, 4);
        let rotated = rotate_cw(&rotate_cw(&image, 90.0), 270.0);
        assert_eq!(rotated, image);
    }

    #[test]
    fn test_quarter_turn_is_clockwise() {
        // 2x1 image: left pixel 10, right pixel 20
        let image = GrayImage::from_raw(2, 1, vec![10, 20]).unwrap();
        let rotated = rotate_cw(&image, 90.0);
        assert_eq!(rotated.dimensions(), (1, 2));
        // Clockwise: the left pixel ends up on top
        assert_eq!(rotated.get_pixel(0, 0), &Luma([10]));
        assert_eq!(rotated.get_pixel(0, 1), &Luma([20]));

        let rotated = rotate_cw(&image, -90.0);
        assert_eq!(rotated.get_pixel(0, 0), &Luma([20]));
        assert_eq!(rotated.get_pixel(0, 1), &Luma([10]));
    }

    #[test]
    fn test_half_turn_matches_two_quarters() {
        let image = gradient(6, 3);
        let twice = rotate_cw(&rotate_cw(&image, 90.0), 90.0);
        assert_eq!(rotate_cw(&image, 180.0), twice);
        assert_eq!(rotate_cw(&image, -180.0), twice);
    }

    #[test]
    fn test_negative_aliases() {
        let image = gradient(5, 8);
        assert_eq!(rotate_cw(&image, -270.0), rotate_cw(&image, 90.0));
        assert_eq!(rotate_cw(&image, -90.0), rotate_cw(&image, 270.0));
    }

    #[test]
    fn test_arbitrary_angle_keeps_size_and_fills_black() {
        let image = RgbImage::from_pixel(40, 20, Rgb([200, 200, 200]));
        let rotated = rotate_cw(&image, 45.0);
        assert_eq!(rotated.dimensions(), (40, 20));
        // Centre stays inside the source
        assert_eq!(rotated.get_pixel(20, 10), &Rgb([200, 200, 200]));
        // Corners rotate in from outside the source
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rotated.get_pixel(39, 0), &Rgb([0, 0, 0]));
        assert_eq!(rotated.get_pixel(0, 19), &Rgb([0, 0, 0]));
        // (39, 19) samples source x = 39.8, a fifth of the way onto the last column
        assert_eq!(rotated.get_pixel(39, 19), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_transpose_swaps_dimensions() {
        let image = gradient(3, 2);
        let transposed = transpose(&image);
        assert_eq!(transposed.dimensions(), (2, 3));
        assert_eq!(transposed.get_pixel(1, 2), image.get_pixel(2, 1));
    }
}
