//! Facial landmarks and the provider seam for external landmark models

use serde::{Deserialize, Serialize};

use crate::frame::VideoFrame;
use crate::GazeError;

/// Number of points in the 68-point Multi-PIE landmark scheme
pub const LANDMARK_COUNT: usize = 68;

/// Landmark indices outlining the left eye
pub const LEFT_EYE_POINTS: [usize; 6] = [36, 37, 38, 39, 40, 41];

/// Landmark indices outlining the right eye
pub const RIGHT_EYE_POINTS: [usize; 6] = [42, 43, 44, 45, 46, 47];

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &PixelPoint) -> f64 {
        let dx = (i64::from(self.x) - i64::from(other.x)) as f64;
        let dy = (i64::from(self.y) - i64::from(other.y)) as f64;
        dx.hypot(dy)
    }

    /// Midpoint between two points, truncated toward zero
    pub fn midpoint(&self, other: &PixelPoint) -> PixelPoint {
        // Half the sum of two i32 values always fits back into i32
        let half = |a: i32, b: i32| ((i64::from(a) + i64::from(b)) / 2) as i32;
        PixelPoint {
            x: half(self.x, other.x),
            y: half(self.y, other.y),
        }
    }

    /// Translate by an offset, saturating at the coordinate range
    pub fn offset(&self, by: PixelPoint) -> PixelPoint {
        PixelPoint {
            x: self.x.saturating_add(by.x),
            y: self.y.saturating_add(by.y),
        }
    }
}

/// Which eye to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left = 0,
    Right = 1,
}

impl Side {
    /// Landmark indices for this eye
    pub fn landmark_indices(self) -> [usize; 6] {
        match self {
            Side::Left => LEFT_EYE_POINTS,
            Side::Right => RIGHT_EYE_POINTS,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = GazeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Side::Left),
            1 => Ok(Side::Right),
            other => Err(GazeError::InvalidSide(other)),
        }
    }
}

/// Face bounding box
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// 68 facial landmarks for one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    bbox: FaceBbox,
    points: Vec<PixelPoint>,
}

impl FaceLandmarks {
    /// Build a landmark set, requiring exactly 68 points
    pub fn new(bbox: FaceBbox, points: Vec<PixelPoint>) -> Result<Self, GazeError> {
        if points.len() != LANDMARK_COUNT {
            return Err(GazeError::InvalidLandmarks(format!(
                "expected {} points, got {}",
                LANDMARK_COUNT,
                points.len()
            )));
        }
        Ok(Self { bbox, points })
    }

    pub fn bbox(&self) -> FaceBbox {
        self.bbox
    }

    /// The six contour points of one eye, in landmark order
    pub fn eye_points(&self, side: Side) -> [PixelPoint; 6] {
        // `new` guarantees 68 points, so every eye index is present
        side.landmark_indices().map(|i| self.points[i])
    }
}

/// Source of facial landmarks for a frame
///
/// Implemented by whatever face/landmark model the caller runs. Returning
/// `Ok(None)` means no face was found, which is a normal outcome.
pub trait LandmarkProvider {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, GazeError>;
}

/// Provider that replays precomputed landmarks
///
/// Useful when landmarks come from an offline pass or a fixed test rig.
#[derive(Debug, Clone, Default)]
pub struct FixedLandmarks {
    landmarks: Option<FaceLandmarks>,
}

impl FixedLandmarks {
    pub fn new(landmarks: FaceLandmarks) -> Self {
        Self {
            landmarks: Some(landmarks),
        }
    }

    /// Provider that never finds a face
    pub fn none() -> Self {
        Self { landmarks: None }
    }

    /// Replace the landmarks returned for subsequent frames
    pub fn set(&mut self, landmarks: Option<FaceLandmarks>) {
        self.landmarks = landmarks;
    }
}

impl LandmarkProvider for FixedLandmarks {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, GazeError> {
        Ok(self.landmarks.clone())
    }
}
