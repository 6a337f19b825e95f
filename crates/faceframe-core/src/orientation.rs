//! Coarse 2D head orientation from six anchor landmarks.
//!
//! Reported alongside guidance for diagnostics. The classifier does not use it.

use crate::landmarks::{CHIN, LEFT_EYE_OUTER, MOUTH_LEFT, MOUTH_RIGHT, NOSE_TIP, RIGHT_EYE_OUTER};
use crate::types::LandmarkSet;
use serde::Serialize;

const ANCHORS: [usize; 6] = [NOSE_TIP, CHIN, RIGHT_EYE_OUTER, LEFT_EYE_OUTER, MOUTH_RIGHT, MOUTH_LEFT];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadOrientation {
    /// Eye-line angle in pixel space, left eye corner to right eye corner.
    pub yaw_degrees: f32,
    /// Angle of the eye-centre-to-chin drop against the nose-to-chin offset.
    pub pitch_degrees: f32,
}

impl HeadOrientation {
    /// Estimate from a landmark set on a `width`×`height` frame.
    ///
    /// Returns `None` when any anchor point is missing or not finite.
    pub fn estimate(landmarks: &LandmarkSet, width: u32, height: u32) -> Option<Self> {
        let mut px = [(0.0f32, 0.0f32); 6];
        for (slot, &index) in px.iter_mut().zip(ANCHORS.iter()) {
            let p = landmarks.get(index).filter(|p| p.is_finite())?;
            *slot = p.to_pixel(width, height);
        }
        let [nose, chin, right_eye, left_eye, _, _] = px;

        let dx = right_eye.0 - left_eye.0;
        let dy = right_eye.1 - left_eye.1;
        let yaw_degrees = dy.atan2(dx).to_degrees();

        let eye_center_y = (left_eye.1 + right_eye.1) / 2.0;
        let pitch_degrees = (chin.1 - eye_center_y).atan2(chin.0 - nose.0).to_degrees();

        Some(Self {
            yaw_degrees,
            pitch_degrees,
        })
    }
}
