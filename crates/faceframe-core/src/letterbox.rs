//! Aspect-preserving resize into a square model input, padded with zeros.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Placement of a resized image inside a `size`×`size` model input.
///
/// Padding is stored in whole pixels so the same offset is used to place the
/// pixels and to map model coordinates back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub new_width: u32,
    pub new_height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub size: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            new_width,
            new_height,
            pad_x: (size - new_width) / 2,
            pad_y: (size - new_height) / 2,
            size,
        }
    }

    /// Map a point in model-input pixels back to source-image pixels.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }

    /// Resize `image` into a 1×3×size×size tensor. Padding stays 0.0.
    pub fn to_tensor(&self, image: &RgbImage, normalize: impl Fn(u8) -> f32) -> Array4<f32> {
        let size = self.size as usize;
        let resized = imageops::resize(image, self.new_width, self.new_height, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let tx = (x + self.pad_x) as usize;
            let ty = (y + self.pad_y) as usize;
            if tx >= size || ty >= size {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = normalize(pixel[c]);
            }
        }
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_fit_landscape() {
        let lb = Letterbox::fit(640, 480, 192);
        assert!((lb.scale - 0.3).abs() < 1e-6);
        assert_eq!((lb.new_width, lb.new_height), (192, 144));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 24));
    }

    #[test]
    fn test_odd_padding_maps_back_exactly() {
        // 370 * 0.3 = 111 rows, leaving 81 rows of padding.
        let lb = Letterbox::fit(640, 370, 192);
        assert_eq!(lb.new_height, 111);
        assert_eq!(lb.pad_y, 40);

        let model_y = 185.0 * lb.scale + lb.pad_y as f32;
        let (_, y) = lb.to_source(96.0, model_y);
        assert!((y - 185.0).abs() < 1e-3, "y = {y}");
    }

    #[test]
    fn test_tensor_rows_start_at_padding() {
        let mut image = RgbImage::from_pixel(640, 370, Rgb([0, 0, 0]));
        for y in 0..10 {
            for x in 0..640 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let lb = Letterbox::fit(640, 370, 192);
        let tensor = lb.to_tensor(&image, |c| c as f32 / 255.0);
        assert_eq!(tensor.shape(), &[1, 3, 192, 192]);
        let top = lb.pad_y as usize;
        assert_eq!(tensor[[0, 0, top - 1, 96]], 0.0);
        assert!((tensor[[0, 0, top, 96]] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_square_input_has_no_padding() {
        let lb = Letterbox::fit(300, 300, 192);
        assert_eq!((lb.pad_x, lb.pad_y), (0, 0));
        let (x, y) = lb.to_source(192.0, 192.0);
        assert!((x - 300.0).abs() < 1e-3 && (y - 300.0).abs() < 1e-3);
    }
}
