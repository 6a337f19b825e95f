//! Pose feature extraction.
//!
//! Reduces a landmark set to the handful of scalar signals the guidance
//! classifier needs: where the face sits in the frame, how large it is,
//! and how it is rotated. All values are in normalized frame units.

use crate::landmarks::{CHIN, FOREHEAD, LEFT_EYE_OUTER, RIGHT_EYE_OUTER};
use crate::types::{Landmark, LandmarkSet};
use serde::Serialize;
use thiserror::Error;

/// Below this eye-to-chin distance the tilt ratio is treated as unknown.
const MIN_TILT_DENOMINATOR: f32 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("no face landmarks")]
    NoFace,
    #[error("landmark {0} missing from set")]
    MissingLandmark(usize),
    #[error("landmark coordinates are not finite")]
    NonFinite,
}

/// Geometric pose signals for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseSignals {
    /// Face bounding-box centre minus frame centre, horizontally (−0.5..0.5).
    pub center_offset_x: f32,
    /// Face bounding-box centre minus frame centre, vertically (−0.5..0.5).
    pub center_offset_y: f32,
    /// Angle of the eye line against the horizontal. Positive when the
    /// right-hand eye sits lower than the left-hand one.
    pub yaw_degrees: f32,
    /// Forehead-to-eyes over eyes-to-chin. `None` when the geometry is degenerate.
    pub tilt_ratio: Option<f32>,
    /// Vertical eyes-to-chin distance; grows as the face approaches the camera.
    pub face_span: f32,
}

impl PoseSignals {
    /// Derive pose signals from a landmark set.
    pub fn extract(landmarks: &LandmarkSet) -> Result<Self, FeatureError> {
        if landmarks.is_empty() {
            return Err(FeatureError::NoFace);
        }
        if !landmarks.points.iter().all(Landmark::is_finite) {
            return Err(FeatureError::NonFinite);
        }

        let point = |index: usize| {
            landmarks
                .get(index)
                .copied()
                .ok_or(FeatureError::MissingLandmark(index))
        };
        let eye_a = point(LEFT_EYE_OUTER)?;
        let eye_b = point(RIGHT_EYE_OUTER)?;
        let chin = point(CHIN)?;
        let forehead = point(FOREHEAD)?;

        let (min_x, min_y, max_x, max_y) = landmarks.bounds().ok_or(FeatureError::NoFace)?;
        let center_offset_x = (min_x + max_x) / 2.0 - 0.5;
        let center_offset_y = (min_y + max_y) / 2.0 - 0.5;

        // Order by x so a mirrored set keeps the same sign convention.
        let (left_eye, right_eye) = if eye_a.x <= eye_b.x {
            (eye_a, eye_b)
        } else {
            (eye_b, eye_a)
        };
        let yaw_degrees = (right_eye.y - left_eye.y)
            .atan2(right_eye.x - left_eye.x)
            .to_degrees();

        let avg_eye_y = (left_eye.y + right_eye.y) / 2.0;
        let top_length = avg_eye_y - forehead.y;
        let bottom_length = chin.y - avg_eye_y;
        let tilt_ratio = tilt_ratio(top_length, bottom_length);

        Ok(Self {
            center_offset_x,
            center_offset_y,
            yaw_degrees,
            tilt_ratio,
            face_span: bottom_length,
        })
    }
}

fn tilt_ratio(top_length: f32, bottom_length: f32) -> Option<f32> {
    if bottom_length < MIN_TILT_DENOMINATOR {
        return None;
    }
    let ratio = top_length / bottom_length;
    ratio.is_finite().then_some(ratio)
}
