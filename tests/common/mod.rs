//! Shared fixtures for the integration tests

#![allow(dead_code)]

use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use image_enhance::{FaceDetector, FaceRegion};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One-stage Haar cascade that fires when a 20x20 window has a dark centre and a bright border
pub const DARK_CENTER_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stageParams><maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams><maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>0 -1 0 -0.5</internalNodes>
          <leafValues>1. -1.</leafValues>
        </_>
      </weakClassifiers>
    </_>
  </stages>
  <features>
    <_>
      <rects>
        <_>0 0 20 20 -1.</_>
        <_>5 5 10 10 4.</_>
      </rects>
    </_>
  </features>
</cascade>
</opencv_storage>
"#;

/// Write [`DARK_CENTER_CASCADE`] into `dir`
pub fn write_cascade(dir: &Path) -> PathBuf {
    let path = dir.join("dark_center.xml");
    std::fs::write(&path, DARK_CENTER_CASCADE).unwrap();
    path
}

/// Smooth colour ramp without flat regions
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 200) as u8 + 30,
        ])
    })
}

/// White canvas with a black square
pub fn dark_square(width: u32, height: u32, square: (u32, u32, u32)) -> RgbImage {
    let (sx, sy, side) = square;
    RgbImage::from_fn(width, height, |x, y| {
        let inside = x >= sx && x < sx + side && y >= sy && y < sy + side;
        if inside {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// Save `image` under `name` in `dir` using `format`, whatever the name's extension
pub fn save_as(image: &RgbImage, dir: &Path, name: &str, format: ImageFormat) -> PathBuf {
    let path = dir.join(name);
    image.save_with_format(&path, format).unwrap();
    path
}

/// Save `image` as a JPEG carrying an EXIF orientation tag
pub fn oriented_jpeg(image: &RgbImage, dir: &Path, name: &str, orientation: u8) -> PathBuf {
    let mut jpeg = Cursor::new(Vec::new());
    image.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
    let jpeg = jpeg.into_inner();

    // Little-endian TIFF header with a single Orientation (0x0112, SHORT) entry
    let tiff: Vec<u8> = [
        &b"II*\0"[..],
        &8_u32.to_le_bytes(),
        &1_u16.to_le_bytes(),
        &0x0112_u16.to_le_bytes(),
        &3_u16.to_le_bytes(),
        &1_u32.to_le_bytes(),
        &[orientation, 0, 0, 0],
        &0_u32.to_le_bytes(),
    ]
    .concat();
    let payload = [&b"Exif\0\0"[..], &tiff].concat();
    let length = u16::try_from(payload.len() + 2).unwrap();
    let bytes = [&[0xFF, 0xD8, 0xFF, 0xE1][..], &length.to_be_bytes(), &payload, &jpeg[2..]].concat();

    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Reports `face` only for buffers of the given dimensions and counts every call
pub struct ScriptedDetector {
    pub wanted: Option<(u32, u32)>,
    pub face: FaceRegion,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn matching(wanted: (u32, u32), face: FaceRegion) -> Self {
        Self {
            wanted: Some(wanted),
            face,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn never() -> Self {
        Self {
            wanted: None,
            face: FaceRegion::new(0, 0, 0, 0),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.wanted {
            Some(wanted) if gray.dimensions() == wanted => vec![self.face],
            _ => Vec::new(),
        }
    }
}

/// Count pixels at exactly zero
pub fn black_pixels(image: &GrayImage) -> usize {
    image.pixels().filter(|p| **p == Luma([0])).count()
}

/// Number of entries in `dir`
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
