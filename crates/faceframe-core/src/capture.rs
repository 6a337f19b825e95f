//! Still-frame capture: mirror, brightness, JPEG encode, data URI.
//!
//! Capture is independent of guidance and is allowed in any pose state.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbImage};
use std::path::Path;
use thiserror::Error;

pub const JPEG_QUALITY: u8 = 95;
pub const MIN_BRIGHTNESS_PERCENT: u32 = 50;
pub const MAX_BRIGHTNESS_PERCENT: u32 = 200;
pub const DEFAULT_BRIGHTNESS_PERCENT: u32 = 100;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("brightness {0}% outside the 50–200% range")]
    BrightnessOutOfRange(u32),
    #[error("frame is empty")]
    EmptyFrame,
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Render state applied to a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    mirrored: bool,
    brightness_percent: u32,
}

impl CaptureSettings {
    pub fn new(mirrored: bool, brightness_percent: u32) -> Result<Self, CaptureError> {
        if !(MIN_BRIGHTNESS_PERCENT..=MAX_BRIGHTNESS_PERCENT).contains(&brightness_percent) {
            return Err(CaptureError::BrightnessOutOfRange(brightness_percent));
        }
        Ok(Self {
            mirrored,
            brightness_percent,
        })
    }

    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn brightness_percent(&self) -> u32 {
        self.brightness_percent
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            mirrored: false,
            brightness_percent: DEFAULT_BRIGHTNESS_PERCENT,
        }
    }
}

/// An encoded still frame.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedImage {
    pub fn to_data_uri(&self) -> String {
        format!("{DATA_URI_PREFIX}{}", STANDARD.encode(&self.jpeg))
    }
}

/// Capture `frame` at its native resolution with the given render state.
pub fn capture(frame: &RgbImage, settings: &CaptureSettings) -> Result<CapturedImage, CaptureError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyFrame);
    }

    let mut raster = if settings.mirrored {
        imageops::flip_horizontal(frame)
    } else {
        frame.clone()
    };
    apply_brightness(&mut raster, settings.brightness_percent);

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder.encode_image(&DynamicImage::ImageRgb8(raster))?;

    tracing::debug!(
        width,
        height,
        bytes = jpeg.len(),
        mirrored = settings.mirrored,
        brightness = settings.brightness_percent,
        "captured still frame"
    );

    Ok(CapturedImage {
        jpeg,
        width,
        height,
    })
}

/// Load an image file and run it through the same capture path.
pub fn capture_file(path: &Path, settings: &CaptureSettings) -> Result<CapturedImage, CaptureError> {
    let frame = image::open(path)?.into_rgb8();
    capture(&frame, settings)
}

/// Scale R, G and B by `percent / 100`, saturating at 255.
pub fn apply_brightness(raster: &mut RgbImage, percent: u32) {
    if percent == 100 {
        return;
    }
    let factor = percent as f32 / 100.0;
    for channel in raster.iter_mut() {
        *channel = (*channel as f32 * factor).round().min(255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| Rgb([(x * 40) as u8, 100, 200]))
    }

    #[test]
    fn test_brightness_bounds() {
        assert!(CaptureSettings::new(false, 50).is_ok());
        assert!(CaptureSettings::new(false, 200).is_ok());
        assert!(matches!(
            CaptureSettings::new(false, 49),
            Err(CaptureError::BrightnessOutOfRange(49))
        ));
        assert!(matches!(
            CaptureSettings::new(true, 201),
            Err(CaptureError::BrightnessOutOfRange(201))
        ));
    }

    #[test]
    fn test_brightness_scales_and_saturates() {
        let mut img = RgbImage::from_pixel(1, 1, Rgb([100, 200, 10]));
        apply_brightness(&mut img, 150);
        assert_eq!(img.get_pixel(0, 0), &Rgb([150, 255, 15]));
    }

    #[test]
    fn test_brightness_darkens() {
        let mut img = RgbImage::from_pixel(1, 1, Rgb([100, 201, 0]));
        apply_brightness(&mut img, 50);
        assert_eq!(img.get_pixel(0, 0), &Rgb([50, 101, 0]));
    }

    #[test]
    fn test_capture_keeps_native_resolution() {
        let shot = capture(&gradient(6, 4), &CaptureSettings::default()).unwrap();
        assert_eq!((shot.width, shot.height), (6, 4));
        let decoded = image::load_from_memory(&shot.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[test]
    fn test_data_uri_prefix() {
        let shot = capture(&gradient(4, 4), &CaptureSettings::default()).unwrap();
        let uri = shot.to_data_uri();
        assert!(uri.starts_with("data:image/jpeg;base64,/9j/"), "{}", &uri[..40]);
        let payload = STANDARD.decode(&uri[DATA_URI_PREFIX.len()..]).unwrap();
        assert_eq!(payload, shot.jpeg);
    }

    #[test]
    fn test_mirrored_capture_flips_columns() {
        let mut frame = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        for y in 0..16 {
            for x in 0..4 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let settings = CaptureSettings::new(true, 100).unwrap();
        let shot = capture(&frame, &settings).unwrap();
        let decoded = image::load_from_memory(&shot.jpeg).unwrap().into_rgb8();
        assert!(decoded.get_pixel(14, 8)[0] > 200);
        assert!(decoded.get_pixel(1, 8)[0] < 50);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let err = capture(&RgbImage::new(0, 0), &CaptureSettings::default()).unwrap_err();
        assert!(matches!(err, CaptureError::EmptyFrame));
    }
}
