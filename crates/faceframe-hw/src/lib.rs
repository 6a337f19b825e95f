//! faceframe-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access, conversion of raw pixel formats to
//! RGB, and the pull-based [`FrameFeed`] interface the frame loop reads from.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::{Frame, FrameError, FrameFeed};
