//! Face-mesh landmark backend via ONNX Runtime.
//!
//! An SCRFD detector finds the face, a padded square crop around it is
//! letterboxed into the 192×192 face-mesh input, and the 468 (or 478 with
//! iris refinement) predicted points are mapped back through the letterbox
//! and the crop to normalized frame coordinates.

use crate::detector::{FaceBox, FaceDetector};
use crate::landmarks::{MESH_POINTS, MESH_POINTS_WITH_IRIS};
use crate::letterbox::Letterbox;
use crate::source::{LandmarkSource, SourceError};
use crate::types::{Landmark, LandmarkSet};
use image::imageops;
use image::RgbImage;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const MESH_INPUT_SIZE: u32 = 192;
const MESH_PRESENCE_THRESHOLD: f32 = 0.5;
const MESH_INTRA_THREADS: usize = 2;
/// Extra context around the detected box, as a fraction of its longer side.
const CROP_PADDING: f32 = 0.25;

/// What an output tensor carries, judged by its element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Landmarks,
    Presence,
    Other,
}

fn output_kind(len: usize) -> OutputKind {
    match len {
        n if n == MESH_POINTS * 3 || n == MESH_POINTS_WITH_IRIS * 3 => OutputKind::Landmarks,
        1 => OutputKind::Presence,
        _ => OutputKind::Other,
    }
}

/// Frame region the mesh runs on, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropRegion {
    /// Square region around `face`, grown by [`CROP_PADDING`] and clipped to
    /// the frame. `None` if nothing of it is left inside the frame.
    fn around(face: &FaceBox, frame_width: u32, frame_height: u32) -> Option<Self> {
        let side = face.width.max(face.height) * (1.0 + CROP_PADDING);
        let cx = face.x + face.width / 2.0;
        let cy = face.y + face.height / 2.0;
        let (fw, fh) = (frame_width as f32, frame_height as f32);

        let x0 = (cx - side / 2.0).floor().clamp(0.0, fw);
        let y0 = (cy - side / 2.0).floor().clamp(0.0, fh);
        let x1 = (cx + side / 2.0).ceil().clamp(0.0, fw);
        let y1 = (cy + side / 2.0).ceil().clamp(0.0, fh);
        if !(x1 - x0 >= 1.0 && y1 - y0 >= 1.0) {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Face-mesh model with its face detector, wrapped as a [`LandmarkSource`].
pub struct FaceMeshSource {
    session: Session,
    num_outputs: usize,
    detector: FaceDetector,
}

impl FaceMeshSource {
    /// Load the face-mesh and SCRFD detector ONNX models.
    pub fn load(model_path: &str, detector_path: &str) -> Result<Self, SourceError> {
        if !Path::new(model_path).exists() {
            return Err(SourceError::ModelNotFound(model_path.to_string()));
        }
        let detector = FaceDetector::load(detector_path)?;

        let session = Session::builder()?
            .with_intra_threads(MESH_INTRA_THREADS)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face-mesh model"
        );

        if num_outputs == 0 {
            return Err(SourceError::InferenceFailed(
                "face-mesh model declares no outputs".into(),
            ));
        }

        Ok(Self {
            session,
            num_outputs,
            detector,
        })
    }
}

impl LandmarkSource for FaceMeshSource {
    fn name(&self) -> &str {
        "face-mesh"
    }

    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>, SourceError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let faces = self.detector.detect(frame)?;
        let Some(region) = faces
            .first()
            .and_then(|face| CropRegion::around(face, width, height))
        else {
            return Ok(None);
        };

        let crop = imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image();
        let letterbox = Letterbox::fit(region.width, region.height, MESH_INPUT_SIZE);
        let input = letterbox.to_tensor(&crop, |c| c as f32 / 255.0);

        let num_outputs = self.num_outputs;
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut coords: Option<Vec<f32>> = None;
        let mut presence: Option<f32> = None;
        for idx in 0..num_outputs {
            let (_, values) = outputs[idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| SourceError::InferenceFailed(format!("output {idx}: {e}")))?;
            match output_kind(values.len()) {
                OutputKind::Landmarks if coords.is_none() => coords = Some(values.to_vec()),
                OutputKind::Presence if presence.is_none() => presence = values.first().copied(),
                _ => {}
            }
        }

        let coords = coords.ok_or_else(|| {
            SourceError::InferenceFailed("no output tensor shaped like face-mesh landmarks".into())
        })?;

        if let Some(logit) = presence {
            let score = sigmoid(logit);
            if score < MESH_PRESENCE_THRESHOLD {
                tracing::trace!(score, "face-mesh presence below threshold");
                return Ok(None);
            }
        }

        Ok(Some(decode_landmarks(&coords, &letterbox, &region, width, height)))
    }
}

/// Map flat `[x, y, z]` triples in model-input pixels back through the
/// letterbox and the crop to normalized frame coordinates.
fn decode_landmarks(
    coords: &[f32],
    letterbox: &Letterbox,
    region: &CropRegion,
    width: u32,
    height: u32,
) -> LandmarkSet {
    let points = coords
        .chunks_exact(3)
        .map(|c| {
            let (cx, cy) = letterbox.to_source(c[0], c[1]);
            Landmark {
                x: (region.x as f32 + cx) / width as f32,
                y: (region.y as f32 + cy) / height as f32,
                z: Some(c[2] / MESH_INPUT_SIZE as f32),
            }
        })
        .collect();
    LandmarkSet::new(points)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_box(x: f32, y: f32, w: f32, h: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_load_missing_model() {
        let err = FaceMeshSource::load("/nonexistent/face_mesh.onnx", "/nonexistent/det_10g.onnx")
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::ModelNotFound(p) if p.ends_with("face_mesh.onnx")));
    }

    #[test]
    fn test_crop_is_padded_square() {
        let region = CropRegion::around(&face_box(800.0, 400.0, 160.0, 200.0), 1920, 1080).unwrap();
        // Longer side 200, grown by a quarter.
        assert_eq!((region.width, region.height), (250, 250));
        assert_eq!((region.x, region.y), (755, 375));
    }

    #[test]
    fn test_crop_clipped_to_frame() {
        let region = CropRegion::around(&face_box(-40.0, 900.0, 200.0, 200.0), 1920, 1080).unwrap();
        assert_eq!(region.x, 0);
        assert_eq!(region.y + region.height, 1080);
        assert!(region.width < 250 && region.height < 250);
    }

    #[test]
    fn test_crop_outside_frame() {
        assert!(CropRegion::around(&face_box(3000.0, 100.0, 100.0, 100.0), 1920, 1080).is_none());
        assert!(CropRegion::around(&face_box(f32::NAN, 100.0, 100.0, 100.0), 1920, 1080).is_none());
    }

    #[test]
    fn test_decode_maps_through_crop() {
        let (w, h) = (1920u32, 1080u32);
        let region = CropRegion::around(&face_box(800.0, 400.0, 160.0, 200.0), w, h).unwrap();
        let lb = Letterbox::fit(region.width, region.height, MESH_INPUT_SIZE);

        // A frame point inside the crop, projected into model space.
        let (fx, fy) = (880.0f32, 530.0f32);
        let mx = (fx - region.x as f32) * lb.scale + lb.pad_x as f32;
        let my = (fy - region.y as f32) * lb.scale + lb.pad_y as f32;
        let mut coords = vec![0.0f32; MESH_POINTS * 3];
        coords[0] = mx;
        coords[1] = my;
        coords[2] = 9.6;

        let set = decode_landmarks(&coords, &lb, &region, w, h);
        assert_eq!(set.len(), MESH_POINTS);
        let p = set.points[0];
        assert!((p.x - fx / w as f32).abs() < 1e-4, "x = {}", p.x);
        assert!((p.y - fy / h as f32).abs() < 1e-4, "y = {}", p.y);
        assert!((p.z.unwrap() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_decode_non_square_crop() {
        let region = CropRegion {
            x: 100,
            y: 50,
            width: 300,
            height: 151,
        };
        let lb = Letterbox::fit(region.width, region.height, MESH_INPUT_SIZE);
        let my = 75.0 * lb.scale + lb.pad_y as f32;
        let coords = [lb.pad_x as f32, my, 0.0];
        let set = decode_landmarks(&coords, &lb, &region, 640, 480);
        assert!((set.points[0].x - 100.0 / 640.0).abs() < 1e-4);
        assert!((set.points[0].y - 125.0 / 480.0).abs() < 1e-4, "y = {}", set.points[0].y);
    }

    #[test]
    fn test_output_kind_by_len() {
        assert_eq!(output_kind(1404), OutputKind::Landmarks);
        assert_eq!(output_kind(1434), OutputKind::Landmarks);
        assert_eq!(output_kind(1), OutputKind::Presence);
        assert_eq!(output_kind(266), OutputKind::Other);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(6.0) > 0.99);
        assert!(sigmoid(-6.0) < 0.01);
    }
}
