//! Anatomical indices into the 468/478-point face mesh topology.
//!
//! "Left" and "right" name the side of the raw camera image the point
//! appears on, not the subject's own left and right.

pub const NOSE_TIP: usize = 1;
pub const FOREHEAD: usize = 10;
pub const LEFT_EYE_OUTER: usize = 33;
pub const MOUTH_LEFT: usize = 61;
pub const CHIN: usize = 152;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const MOUTH_RIGHT: usize = 291;

/// Points visited in order around the face oval, used for the overlay outline.
pub const FACE_OUTLINE: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377,
    152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Number of points in the base face mesh.
pub const MESH_POINTS: usize = 468;
/// Number of points when the iris refinement is included.
pub const MESH_POINTS_WITH_IRIS: usize = 478;
