//! Gaze tracking configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::GazeError;

/// Gaze tracking configuration
///
/// The direction and blink thresholds are empirical; tune them per camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Horizontal ratio at or below which gaze is classified as right
    pub right_threshold: f64,

    /// Horizontal ratio at or above which gaze is classified as left
    pub left_threshold: f64,

    /// Mean blink ratio (eye width / height) above which eyes are closed
    pub blink_threshold: f64,

    /// Threshold samples collected per eye before calibration is complete
    pub calibration_frames: usize,

    /// Fraction of eye pixels expected to be dark (iris) at the best threshold
    pub target_iris_ratio: f64,

    /// Binarization threshold used before any calibration sample exists
    pub default_threshold: u8,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            right_threshold: 0.35,
            left_threshold: 0.65,
            blink_threshold: 3.8,
            calibration_frames: 20,
            target_iris_ratio: 0.35,
            default_threshold: 50,
        }
    }
}

impl GazeConfig {
    /// Narrow center band, quick to report left/right
    pub fn strict() -> Self {
        Self {
            right_threshold: 0.42,
            left_threshold: 0.58,
            blink_threshold: 3.5,
            ..Default::default()
        }
    }

    /// Wide center band, only extreme glances count as left/right
    pub fn lenient() -> Self {
        Self {
            right_threshold: 0.25,
            left_threshold: 0.75,
            blink_threshold: 4.5,
            ..Default::default()
        }
    }

    /// Load from a config file, overridden by `GAZE_*` environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GazeError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(::config::Environment::with_prefix("GAZE"))
            .build()?;

        let loaded: GazeConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), GazeError> {
        if !(0.0..=1.0).contains(&self.right_threshold)
            || !(0.0..=1.0).contains(&self.left_threshold)
            || self.right_threshold >= self.left_threshold
        {
            return Err(GazeError::Config(format!(
                "direction thresholds must satisfy 0 <= right ({}) < left ({}) <= 1",
                self.right_threshold, self.left_threshold
            )));
        }
        if !(self.blink_threshold.is_finite() && self.blink_threshold > 0.0) {
            return Err(GazeError::Config(format!(
                "blink threshold must be positive, got {}",
                self.blink_threshold
            )));
        }
        if self.calibration_frames == 0 {
            return Err(GazeError::Config(
                "calibration needs at least one frame".into(),
            ));
        }
        if !(self.target_iris_ratio > 0.0 && self.target_iris_ratio < 1.0) {
            return Err(GazeError::Config(format!(
                "target iris ratio must be in (0, 1), got {}",
                self.target_iris_ratio
            )));
        }
        if self.default_threshold > 100 {
            return Err(GazeError::Config(format!(
                "default threshold must be in [0, 100], got {}",
                self.default_threshold
            )));
        }
        Ok(())
    }
}
