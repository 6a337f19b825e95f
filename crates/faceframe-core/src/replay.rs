//! Recorded landmark backend.
//!
//! Reads one frame per line of JSON: either a landmark set object
//! (`{"points":[{"x":0.5,"y":0.4}, ...]}`) or `null` for a frame with no face.
//! Blank lines are skipped.

use crate::source::{LandmarkSource, SourceError};
use crate::types::LandmarkSet;
use image::RgbImage;
use std::collections::VecDeque;
use std::io::BufRead;

/// Parse recorded frames from a JSON-lines reader.
pub fn read_frames(reader: impl BufRead) -> Result<Vec<Option<LandmarkSet>>, SourceError> {
    let mut frames = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let frame = serde_json::from_str::<Option<LandmarkSet>>(trimmed)
            .map_err(|source| SourceError::Replay { line: i + 1, source })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Plays back recorded landmarks, one per `estimate` call, ignoring the frame.
pub struct ReplaySource {
    frames: VecDeque<Option<LandmarkSet>>,
}

impl ReplaySource {
    pub fn new(frames: Vec<Option<LandmarkSet>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, SourceError> {
        let frames = read_frames(reader)?;
        tracing::info!(frames = frames.len(), "loaded landmark recording");
        Ok(Self::new(frames))
    }

    /// Frames not yet played.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn estimate(&mut self, _frame: &RgbImage) -> Result<Option<LandmarkSet>, SourceError> {
        Ok(self.frames.pop_front().flatten())
    }
}
