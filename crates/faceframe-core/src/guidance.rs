//! Guidance classification.
//!
//! Maps one frame's pose signals to a single instruction. Rules are checked in
//! a fixed order and the first one that fires wins:
//!
//! 1. no face
//! 2. face too small / too large (distance gates everything else)
//! 3. off-centre
//! 4. yaw
//! 5. tilt
//! 6. aligned
//!
//! The classifier is memoryless; adjacent frames may flicker between verdicts.

use crate::features::PoseSignals;
use serde::Serialize;
use std::fmt;

/// Acceptance envelope for an aligned face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub yaw_tolerance: f32,
    pub center_tolerance: f32,
    pub min_span: f32,
    pub max_span: f32,
    pub min_tilt_ratio: f32,
    pub max_tilt_ratio: f32,
}

pub const THRESHOLDS: Thresholds = Thresholds {
    yaw_tolerance: 7.0,
    center_tolerance: 0.12,
    min_span: 0.32,
    max_span: 0.42,
    min_tilt_ratio: 0.55,
    max_tilt_ratio: 0.75,
};

/// One instruction for the user. Exactly one is active per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guidance {
    NoFace,
    MoveCloser,
    MoveBack,
    MoveRight,
    MoveLeft,
    MoveDown,
    MoveUp,
    CenterFace,
    TurnRight,
    TurnLeft,
    TiltDown,
    TiltUp,
    HoldStill,
}

impl Guidance {
    pub const ALL: [Guidance; 13] = [
        Guidance::NoFace,
        Guidance::MoveCloser,
        Guidance::MoveBack,
        Guidance::MoveRight,
        Guidance::MoveLeft,
        Guidance::MoveDown,
        Guidance::MoveUp,
        Guidance::CenterFace,
        Guidance::TurnRight,
        Guidance::TurnLeft,
        Guidance::TiltDown,
        Guidance::TiltUp,
        Guidance::HoldStill,
    ];

    pub fn message(self) -> &'static str {
        match self {
            Guidance::NoFace => "No face detected.",
            Guidance::MoveCloser => "Move closer — face too small.",
            Guidance::MoveBack => "Move slightly back — too close.",
            Guidance::MoveRight => "Move face right",
            Guidance::MoveLeft => "Move face left",
            Guidance::MoveDown => "Move face down",
            Guidance::MoveUp => "Move face up",
            Guidance::CenterFace => "Center your face",
            Guidance::TurnRight => "Turn face right",
            Guidance::TurnLeft => "Turn face left",
            Guidance::TiltDown => "Tilt face down",
            Guidance::TiltUp => "Tilt face up",
            Guidance::HoldStill => "Perfect! Hold still.",
        }
    }

    /// True only for the success verdict.
    pub fn is_aligned(self) -> bool {
        self == Guidance::HoldStill
    }
}

impl fmt::Display for Guidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Classify with the standard thresholds. `None` means no face was found.
pub fn classify(pose: Option<&PoseSignals>) -> Guidance {
    classify_with(pose, &THRESHOLDS)
}

pub fn classify_with(pose: Option<&PoseSignals>, t: &Thresholds) -> Guidance {
    let Some(pose) = pose else {
        return Guidance::NoFace;
    };

    // NaN spans fall through both comparisons; treat them as too far away.
    if pose.face_span < t.min_span || pose.face_span.is_nan() {
        return Guidance::MoveCloser;
    }
    if pose.face_span > t.max_span {
        return Guidance::MoveBack;
    }

    // Offsets are in camera coordinates; each message names the offset side.
    let dx = pose.center_offset_x;
    let dy = pose.center_offset_y;
    if dx.abs() > t.center_tolerance || dy.abs() > t.center_tolerance {
        return if dx > t.center_tolerance {
            Guidance::MoveRight
        } else if dx < -t.center_tolerance {
            Guidance::MoveLeft
        } else if dy > t.center_tolerance {
            Guidance::MoveDown
        } else if dy < -t.center_tolerance {
            Guidance::MoveUp
        } else {
            Guidance::CenterFace
        };
    }

    if pose.yaw_degrees.abs() >= t.yaw_tolerance {
        return if pose.yaw_degrees > 0.0 {
            Guidance::TurnRight
        } else {
            Guidance::TurnLeft
        };
    }

    if let Some(tilt) = pose.tilt_ratio {
        if tilt > t.max_tilt_ratio {
            return Guidance::TiltDown;
        }
        if tilt < t.min_tilt_ratio {
            return Guidance::TiltUp;
        }
    }

    Guidance::HoldStill
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::face;
    use crate::types::LandmarkSet;

    fn aligned() -> PoseSignals {
        PoseSignals {
            center_offset_x: 0.0,
            center_offset_y: 0.0,
            yaw_degrees: 0.0,
            tilt_ratio: Some(0.65),
            face_span: 0.37,
        }
    }

    #[test]
    fn test_no_face() {
        assert_eq!(classify(None), Guidance::NoFace);
    }

    #[test]
    fn test_aligned_is_hold_still() {
        let g = classify(Some(&aligned()));
        assert_eq!(g, Guidance::HoldStill);
        assert!(g.is_aligned());
        assert_eq!(g.to_string(), "Perfect! Hold still.");
    }

    #[test]
    fn test_span_wins_over_everything() {
        let mut pose = PoseSignals {
            center_offset_x: 0.4,
            center_offset_y: -0.3,
            yaw_degrees: 25.0,
            tilt_ratio: Some(1.4),
            face_span: 0.10,
        };
        assert_eq!(classify(Some(&pose)), Guidance::MoveCloser);
        pose.face_span = 0.60;
        assert_eq!(classify(Some(&pose)), Guidance::MoveBack);
    }

    #[test]
    fn test_span_bounds_are_in_range() {
        let mut pose = aligned();
        pose.face_span = THRESHOLDS.min_span;
        assert_eq!(classify(Some(&pose)), Guidance::HoldStill);
        pose.face_span = THRESHOLDS.max_span;
        assert_eq!(classify(Some(&pose)), Guidance::HoldStill);
        pose.face_span = THRESHOLDS.min_span - 1e-4;
        assert_eq!(classify(Some(&pose)), Guidance::MoveCloser);
        pose.face_span = THRESHOLDS.max_span + 1e-4;
        assert_eq!(classify(Some(&pose)), Guidance::MoveBack);
    }

    #[test]
    fn test_centering_sweep_flips_once() {
        let mut pose = aligned();
        let mut previous = classify(Some(&pose));
        let mut flips = Vec::new();
        for step in 0..=40 {
            pose.center_offset_x = step as f32 * 0.005;
            let g = classify(Some(&pose));
            if g != previous {
                flips.push((pose.center_offset_x, g));
                previous = g;
            }
        }
        assert_eq!(flips.len(), 1, "flips: {flips:?}");
        let (at, g) = flips[0];
        assert!(at > THRESHOLDS.center_tolerance && at <= THRESHOLDS.center_tolerance + 0.005);
        assert_eq!(g, Guidance::MoveRight);
    }

    #[test]
    fn test_offset_names_direction() {
        let mut pose = aligned();
        pose.center_offset_x = 0.2;
        assert_eq!(classify(Some(&pose)), Guidance::MoveRight);
        pose.center_offset_x = -0.2;
        assert_eq!(classify(Some(&pose)), Guidance::MoveLeft);
        pose.center_offset_x = 0.0;
        pose.center_offset_y = 0.2;
        assert_eq!(classify(Some(&pose)), Guidance::MoveDown);
        pose.center_offset_y = -0.2;
        assert_eq!(classify(Some(&pose)), Guidance::MoveUp);
    }

    #[test]
    fn test_direction_priority() {
        let mut pose = aligned();
        pose.center_offset_x = -0.2;
        pose.center_offset_y = 0.3;
        assert_eq!(classify(Some(&pose)), Guidance::MoveLeft);
        pose.center_offset_x = 0.0;
        assert_eq!(classify(Some(&pose)), Guidance::MoveDown);
        pose.center_offset_y = -0.3;
        assert_eq!(classify(Some(&pose)), Guidance::MoveUp);
    }

    #[test]
    fn test_centering_before_yaw() {
        let mut pose = aligned();
        pose.center_offset_x = 0.2;
        pose.yaw_degrees = 20.0;
        assert_eq!(classify(Some(&pose)), Guidance::MoveRight);
    }

    #[test]
    fn test_yaw_symmetry() {
        let mut pose = aligned();
        pose.yaw_degrees = 8.0;
        assert_eq!(classify(Some(&pose)), Guidance::TurnRight);
        pose.yaw_degrees = -8.0;
        assert_eq!(classify(Some(&pose)), Guidance::TurnLeft);
        pose.yaw_degrees = 6.9;
        assert_eq!(classify(Some(&pose)), Guidance::HoldStill);
        pose.yaw_degrees = 7.0;
        assert_eq!(classify(Some(&pose)), Guidance::TurnRight);
    }

    #[test]
    fn test_yaw_before_tilt() {
        let mut pose = aligned();
        pose.yaw_degrees = -12.0;
        pose.tilt_ratio = Some(0.2);
        assert_eq!(classify(Some(&pose)), Guidance::TurnLeft);
    }

    #[test]
    fn test_tilt_directions() {
        let mut pose = aligned();
        pose.tilt_ratio = Some(0.9);
        assert_eq!(classify(Some(&pose)), Guidance::TiltDown);
        pose.tilt_ratio = Some(0.4);
        assert_eq!(classify(Some(&pose)), Guidance::TiltUp);
    }

    #[test]
    fn test_unknown_tilt_is_skipped() {
        let mut pose = aligned();
        pose.tilt_ratio = None;
        assert_eq!(classify(Some(&pose)), Guidance::HoldStill);
    }

    #[test]
    fn test_nan_signals_resolve() {
        let pose = PoseSignals {
            center_offset_x: f32::NAN,
            center_offset_y: f32::NAN,
            yaw_degrees: f32::NAN,
            tilt_ratio: Some(f32::NAN),
            face_span: f32::NAN,
        };
        assert_eq!(classify(Some(&pose)), Guidance::MoveCloser);
    }

    #[test]
    fn test_messages_unique_and_non_empty() {
        let mut seen = std::collections::HashSet::new();
        for g in Guidance::ALL {
            assert!(!g.message().is_empty());
            assert!(seen.insert(g.message()), "duplicate message {}", g.message());
        }
        assert_eq!(Guidance::ALL.iter().filter(|g| g.is_aligned()).count(), 1);
    }

    #[test]
    fn test_reference_face_end_to_end() {
        let set = face((0.46, 0.45), (0.54, 0.45), (0.5, 0.80), (0.5, 0.25));
        let pose = PoseSignals::extract(&set).unwrap();
        assert_eq!(classify(Some(&pose)), Guidance::HoldStill);
    }

    #[test]
    fn test_empty_set_end_to_end() {
        let pose = PoseSignals::extract(&LandmarkSet::default()).ok();
        assert_eq!(classify(pose.as_ref()), Guidance::NoFace);
    }

    #[test]
    fn test_degenerate_geometry_end_to_end() {
        let set = face((0.46, 0.45), (0.54, 0.45), (0.5, 0.45), (0.5, 0.25));
        let pose = PoseSignals::extract(&set).unwrap();
        assert_eq!(classify(Some(&pose)), Guidance::MoveCloser);
    }
}
