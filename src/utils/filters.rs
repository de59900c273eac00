//! Pixel filters shared by the enhancers and the detector
//!
//! Luminance uses OpenCV's fixed-point weights and every float-to-byte store
//! saturates with ties rounded to even, as `saturate_cast<uchar>` does. The
//! Gaussian itself is evaluated in `f64`; OpenCV's bit-exact 8-bit kernel can
//! land one level away on some blurred samples.

use image::{GrayImage, ImageBuffer, Luma, Pixel, RgbImage};

type Buffer<P> = ImageBuffer<P, Vec<u8>>;

// BT.601 weights scaled by 2^14
const R_TO_Y: u32 = 4899;
const G_TO_Y: u32 = 9617;
const B_TO_Y: u32 = 1868;
const Y_SHIFT: u32 = 14;

/// Single-channel luminance from RGB using fixed-point BT.601 weights
pub fn luma_bt601(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (dst, src) in gray.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = src.0;
        let y = (u32::from(r) * R_TO_Y
            + u32::from(g) * G_TO_Y
            + u32::from(b) * B_TO_Y
            + (1 << (Y_SHIFT - 1)))
            >> Y_SHIFT;
        *dst = Luma([y.min(255) as u8]);
    }
    gray
}

/// Luminance with the red and blue weights exchanged
///
/// This is what an RGB-to-gray conversion yields on blue-first pixel data;
/// the face-masking output is reduced this way. Detection uses [`luma_bt601`].
pub fn luma_bt601_swapped(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (dst, src) in gray.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = src.0;
        let y = (u32::from(b) * R_TO_Y
            + u32::from(g) * G_TO_Y
            + u32::from(r) * B_TO_Y
            + (1 << (Y_SHIFT - 1)))
            >> Y_SHIFT;
        *dst = Luma([y.min(255) as u8]);
    }
    gray
}

/// Kernel size OpenCV derives for 8-bit images when none is given
pub fn auto_kernel_size(sigma: f64) -> usize {
    let size = (sigma * 3.0 * 2.0 + 1.0).round() as usize;
    size | 1
}

/// Normalised 1-D Gaussian kernel
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let size = auto_kernel_size(sigma);
    let center = (size as f64 - 1.0) / 2.0;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirror an out-of-range coordinate without repeating the edge pixel (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(index: i64, len: i64) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut i = index;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * len - 2 - i;
        }
    }
    i as usize
}

/// Separable Gaussian blur with an automatically sized kernel and reflect-101 borders
pub fn gaussian_blur<P>(image: &Buffer<P>, sigma: f64) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    let channels = usize::from(P::CHANNEL_COUNT);
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();

    // Horizontal pass into a float buffer
    let mut horizontal = vec![0.0_f64; w * h * channels];
    for y in 0..h {
        let row = y * w * channels;
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as i64 + k as i64 - radius, w as i64);
                    acc += weight * f64::from(src.get(row + sx * channels + c).copied().unwrap_or(0));
                }
                if let Some(slot) = horizontal.get_mut(row + x * channels + c) {
                    *slot = acc;
                }
            }
        }
    }

    // Vertical pass straight into the output pixels
    let mut blurred: Buffer<P> = ImageBuffer::new(width, height);
    for (x, y, pixel) in blurred.enumerate_pixels_mut() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.channels_mut().iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect_101(y as i64 + k as i64 - radius, h as i64);
                acc += weight * horizontal.get((sy * w + x) * channels + c).copied().unwrap_or(0.0);
            }
            *value = saturate_u8(acc);
        }
    }
    blurred
}

/// `dst = saturate(a * alpha + b * beta + gamma)` per channel
///
/// Both buffers must share dimensions; the output takes `a`'s dimensions and
/// missing samples from `b` count as zero.
pub fn add_weighted<P>(a: &Buffer<P>, alpha: f64, b: &Buffer<P>, beta: f64, gamma: f64) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = a.dimensions();
    let mut out: Buffer<P> = ImageBuffer::new(width, height);
    let b_raw = b.as_raw();
    for ((dst, sa), index) in out
        .iter_mut()
        .zip(a.as_raw().iter())
        .zip(0_usize..)
    {
        let sb = b_raw.get(index).copied().unwrap_or(0);
        *dst = saturate_u8(f64::from(*sa) * alpha + f64::from(sb) * beta + gamma);
    }
    out
}

/// Sharpen by subtracting a blurred copy: `1.5 * image - 0.5 * blur(image, sigma)`
pub fn unsharp_mask<P>(image: &Buffer<P>, sigma: f64) -> Buffer<P>
where
    P: Pixel<Subpixel = u8>,
{
    let blurred = gaussian_blur(image, sigma);
    add_weighted(image, 1.5, &blurred, -0.5, 0.0)
}

fn saturate_u8(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 255.0) as u8
}
