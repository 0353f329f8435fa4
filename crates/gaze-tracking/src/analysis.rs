//! Per-frame gaze analysis results

use serde::{Deserialize, Serialize};

use crate::eye::EyeRegion;
use crate::landmarks::PixelPoint;
use crate::GazeConfig;

/// Discrete gaze direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GazeDirection {
    Left,
    Center,
    Right,
}

impl GazeDirection {
    /// Classify a horizontal ratio against the configured band
    pub fn classify(horizontal_ratio: f64, config: &GazeConfig) -> Self {
        if horizontal_ratio <= config.right_threshold {
            GazeDirection::Right
        } else if horizontal_ratio >= config.left_threshold {
            GazeDirection::Left
        } else {
            GazeDirection::Center
        }
    }
}

/// Complete gaze analysis for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GazeAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Eyes judged closed
    pub blinking: bool,

    /// Mean blink ratio of both eyes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blink_ratio: Option<f64>,

    /// Pupil position across the eyes, 0.0 (image left) to 1.0 (image right)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_ratio: Option<f64>,

    /// Pupil position down the eyes, 0.0 (top) to 1.0 (bottom)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_ratio: Option<f64>,

    /// Discrete direction, when both pupils were found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<GazeDirection>,

    /// Left pupil in frame coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_pupil: Option<PixelPoint>,

    /// Right pupil in frame coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_pupil: Option<PixelPoint>,

    /// Whether threshold calibration had completed for this frame
    pub calibrated: bool,

    /// Isolated left eye (for visualization)
    #[serde(skip)]
    pub left_eye: Option<EyeRegion>,

    /// Isolated right eye (for visualization)
    #[serde(skip)]
    pub right_eye: Option<EyeRegion>,
}

impl GazeAnalysis {
    /// Result for a frame without a usable face
    pub fn no_face() -> Self {
        Self::default()
    }

    /// Both pupils were located
    pub fn pupils_located(&self) -> bool {
        self.left_pupil.is_some() && self.right_pupil.is_some()
    }

    pub fn is_right(&self) -> bool {
        self.direction == Some(GazeDirection::Right)
    }

    pub fn is_left(&self) -> bool {
        self.direction == Some(GazeDirection::Left)
    }

    pub fn is_center(&self) -> bool {
        self.direction == Some(GazeDirection::Center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_band() {
        let config = GazeConfig::default();
        assert_eq!(GazeDirection::classify(0.1, &config), GazeDirection::Right);
        assert_eq!(GazeDirection::classify(0.35, &config), GazeDirection::Right);
        assert_eq!(GazeDirection::classify(0.5, &config), GazeDirection::Center);
        assert_eq!(GazeDirection::classify(0.65, &config), GazeDirection::Left);
        assert_eq!(GazeDirection::classify(0.9, &config), GazeDirection::Left);
    }

    #[test]
    fn test_tunable_band() {
        let config = GazeConfig::lenient();
        assert_eq!(GazeDirection::classify(0.3, &config), GazeDirection::Center);
    }

    #[test]
    fn test_no_face_serializes_without_undefined_fields() {
        let json = serde_json::to_value(GazeAnalysis::no_face()).unwrap();
        assert_eq!(json["face_detected"], false);
        assert!(json.get("horizontal_ratio").is_none());
        assert!(json.get("left_pupil").is_none());

        let analysis = GazeAnalysis::no_face();
        assert!(!analysis.is_left() && !analysis.is_right() && !analysis.is_center());
        assert!(!analysis.pupils_located());
    }
}
