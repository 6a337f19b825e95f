//! Landmark source capability.
//!
//! A source turns a video frame into at most one face's landmarks. Backends
//! are built once, owned by the guidance session, and released on drop.

use crate::types::LandmarkSet;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("model file not found: {0} (expected an ONNX export)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("replay parse error on line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces landmarks for the single most prominent face in a frame.
pub trait LandmarkSource {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// `Ok(None)` means the frame was processed and contained no face.
    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>, SourceError>;
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>, SourceError> {
        (**self).estimate(frame)
    }
}
