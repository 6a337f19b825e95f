//! Face-outline overlay.
//!
//! Draws a closed polygon through the face-oval landmarks, coloured by the
//! current verdict. Purely cosmetic: it reads the verdict and never changes it.

use crate::guidance::Guidance;
use crate::landmarks::FACE_OUTLINE;
use crate::types::LandmarkSet;
use image::{Rgb, RgbImage};

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    /// Stroke colour when the face is aligned.
    pub aligned: Rgb<u8>,
    /// Stroke colour for every other verdict.
    pub adjust: Rgb<u8>,
    /// Stroke width in pixels.
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            aligned: Rgb([0, 200, 83]),
            adjust: Rgb([255, 82, 82]),
            thickness: 3,
        }
    }
}

/// Stroke the face outline onto `image`.
///
/// With `mirrored` set the x axis is flipped so the outline lines up with a
/// mirrored preview. Returns `false` if the outline could not be drawn.
pub fn draw_outline(
    image: &mut RgbImage,
    landmarks: &LandmarkSet,
    guidance: Guidance,
    style: &OverlayStyle,
    mirrored: bool,
) -> bool {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return false;
    }

    let Some(points) = outline_pixels(landmarks, width, height, mirrored) else {
        tracing::trace!("outline landmarks unavailable, skipping overlay");
        return false;
    };

    let color = if guidance.is_aligned() {
        style.aligned
    } else {
        style.adjust
    };

    for (i, &start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        draw_line(image, start, end, color, style.thickness);
    }
    true
}

/// Project the outline landmarks to integer pixel positions.
fn outline_pixels(
    landmarks: &LandmarkSet,
    width: u32,
    height: u32,
    mirrored: bool,
) -> Option<Vec<(i32, i32)>> {
    FACE_OUTLINE
        .iter()
        .map(|&index| {
            let p = landmarks.get(index).filter(|p| p.is_finite())?;
            let (mut x, y) = p.to_pixel(width, height);
            if mirrored {
                x = (width - 1) as f32 - x;
            }
            Some((x.round() as i32, y.round() as i32))
        })
        .collect()
}

/// Bresenham line with a square brush; pixels outside the image are clipped.
fn draw_line(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>, thickness: u32) {
    let (x1, y1) = to;
    let (mut x, mut y) = from;
    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        stamp(image, x, y, color, thickness);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

fn stamp(image: &mut RgbImage, cx: i32, cy: i32, color: Rgb<u8>, thickness: u32) {
    let (w, h) = image.dimensions();
    let half = thickness.max(1) as i32 / 2;
    let lo = -half;
    let hi = thickness.max(1) as i32 - half;
    for oy in lo..hi {
        for ox in lo..hi {
            let x = cx + ox;
            let y = cy + oy;
            if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
