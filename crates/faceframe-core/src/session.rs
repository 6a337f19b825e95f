//! Per-frame guidance session.
//!
//! Owns a landmark source and runs `estimate → extract → classify` once per
//! frame. Every call returns a report; source failures degrade to "no face"
//! and never stop the session.

use crate::features::PoseSignals;
use crate::guidance::{classify, Guidance};
use crate::orientation::HeadOrientation;
use crate::source::LandmarkSource;
use crate::types::LandmarkSet;
use image::RgbImage;
use serde::Serialize;

/// Outcome of one processed frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    /// 1-based count of frames processed by the session.
    pub sequence: u64,
    pub guidance: Guidance,
    pub message: &'static str,
    pub aligned: bool,
    pub pose: Option<PoseSignals>,
    pub orientation: Option<HeadOrientation>,
    /// Landmarks in camera-image coordinates, as the signals were computed.
    #[serde(skip)]
    pub landmarks: Option<LandmarkSet>,
}

pub struct GuidanceSession<S> {
    source: S,
    sequence: u64,
    last: Option<Guidance>,
    source_failures: u64,
}

impl<S: LandmarkSource> GuidanceSession<S> {
    /// Pose signals are always computed from landmarks in camera coordinates;
    /// preview mirroring is a display concern and does not reach the session.
    pub fn new(source: S) -> Self {
        tracing::info!(source = source.name(), "guidance session started");
        Self {
            source,
            sequence: 0,
            last: None,
            source_failures: 0,
        }
    }

    /// Estimate landmarks for `frame` and classify them.
    pub fn process(&mut self, frame: &RgbImage) -> FrameReport {
        let (width, height) = frame.dimensions();
        let landmarks = match self.source.estimate(frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                self.source_failures += 1;
                tracing::warn!(
                    source = self.source.name(),
                    error = %e,
                    failures = self.source_failures,
                    "landmark estimation failed, treating frame as no face"
                );
                None
            }
        };
        self.observe(landmarks, width, height)
    }

    /// Classify landmarks obtained elsewhere for a `width`×`height` frame.
    pub fn observe(&mut self, landmarks: Option<LandmarkSet>, width: u32, height: u32) -> FrameReport {
        self.sequence += 1;

        let pose = landmarks.as_ref().and_then(|set| match PoseSignals::extract(set) {
            Ok(pose) => Some(pose),
            Err(e) => {
                tracing::trace!(error = %e, "no usable pose in frame");
                None
            }
        });
        let orientation = landmarks
            .as_ref()
            .and_then(|set| HeadOrientation::estimate(set, width, height));

        let guidance = classify(pose.as_ref());
        if self.last != Some(guidance) {
            tracing::debug!(
                sequence = self.sequence,
                from = self.last.map(Guidance::message),
                to = guidance.message(),
                "guidance changed"
            );
            self.last = Some(guidance);
        }

        FrameReport {
            sequence: self.sequence,
            guidance,
            message: guidance.message(),
            aligned: guidance.is_aligned(),
            pose,
            orientation,
            landmarks,
        }
    }

    /// Frames whose landmark estimation returned an error.
    pub fn source_failures(&self) -> u64 {
        self.source_failures
    }

    /// End the session and hand back the source.
    pub fn into_source(self) -> S {
        tracing::info!(
            source = self.source.name(),
            frames = self.sequence,
            failures = self.source_failures,
            "guidance session ended"
        );
        self.source
    }
}
