//! faceframe-core — Face pose guidance, overlay rendering and still capture.
//!
//! Turns per-frame facial landmarks into a single alignment instruction,
//! draws the matching face-outline overlay, and encodes still frames as
//! JPEG data URIs. Landmarks come from a swappable [`LandmarkSource`]; the
//! bundled backends run a face detector and face-mesh model via ONNX
//! Runtime or replay a recording.

pub mod capture;
pub mod detector;
pub mod features;
pub mod guidance;
pub mod landmarks;
mod letterbox;
pub mod mesh;
pub mod orientation;
pub mod overlay;
pub mod replay;
pub mod session;
pub mod source;
pub mod types;

pub use capture::{capture, CaptureError, CaptureSettings, CapturedImage};
pub use detector::{FaceBox, FaceDetector};
pub use features::{FeatureError, PoseSignals};
pub use guidance::{classify, Guidance, Thresholds, THRESHOLDS};
pub use mesh::FaceMeshSource;
pub use orientation::HeadOrientation;
pub use overlay::{draw_outline, OverlayStyle};
pub use replay::ReplaySource;
pub use session::{FrameReport, GuidanceSession};
pub use source::{LandmarkSource, SourceError};
pub use types::{Landmark, LandmarkSet};
