//! Gaze Tracking
//!
//! Gaze direction and blink estimation from facial landmarks:
//! - Eye isolation from the 68-point landmark contour
//! - Self-calibrating pupil binarization threshold
//! - Pupil localization from the binarized eye
//! - Horizontal/vertical gaze ratios and blink detection
//!
//! Landmark detection itself is pluggable through [`LandmarkProvider`].

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod eye;
pub mod frame;
pub mod landmarks;
pub mod pupil;

pub use analysis::{GazeAnalysis, GazeDirection};
pub use calibration::Calibration;
pub use config::GazeConfig;
pub use eye::EyeRegion;
pub use frame::{PixelFormat, VideoFrame};
pub use landmarks::{FaceBbox, FaceLandmarks, FixedLandmarks, LandmarkProvider, PixelPoint, Side};
pub use pupil::{Ellipse, Pupil, PupilLocator};

use image::GrayImage;
use ring_buffer::RingBufferError;
use thiserror::Error;
use tracing::{debug, warn};

/// Gaze tracking error types
#[derive(Error, Debug)]
pub enum GazeError {
    #[error("Invalid eye side {0}, expected 0 (left) or 1 (right)")]
    InvalidSide(u8),

    #[error("Frame is empty")]
    EmptyFrame,

    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Invalid landmarks: {0}")]
    InvalidLandmarks(String),

    #[error("Landmark detection failed: {0}")]
    Landmarks(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("Calibration history: {0}")]
    RingBuffer(#[from] RingBufferError),
}

/// Per-frame gaze estimation pipeline
///
/// Owns the calibration session; use one engine per video stream.
pub struct GazeEngine<P> {
    config: GazeConfig,
    provider: P,
    calibration: Calibration,
}

impl<P: LandmarkProvider> GazeEngine<P> {
    /// Create a new engine with configuration
    pub fn new(provider: P, config: GazeConfig) -> Result<Self, GazeError> {
        config.validate()?;
        Ok(Self {
            calibration: Calibration::new(&config)?,
            provider,
            config,
        })
    }

    /// Analyze a single frame
    pub fn refresh(&mut self, frame: &VideoFrame) -> Result<GazeAnalysis, GazeError> {
        let gray = frame.to_gray_image()?;

        let Some(landmarks) = self.provider.detect(frame)? else {
            debug!(sequence = frame.sequence, "no face detected");
            return Ok(GazeAnalysis {
                calibrated: self.calibration.is_complete(),
                ..GazeAnalysis::no_face()
            });
        };

        let analysis = self.analyze_landmarks(&gray, &landmarks);
        debug!(
            sequence = frame.sequence,
            face = ?landmarks.bbox(),
            blinking = analysis.blinking,
            horizontal = ?analysis.horizontal_ratio,
            direction = ?analysis.direction,
            "frame analyzed"
        );
        Ok(analysis)
    }

    /// Run the eye pipeline with landmarks the caller already has
    pub fn analyze_landmarks(&mut self, gray: &GrayImage, landmarks: &FaceLandmarks) -> GazeAnalysis {
        let eyes = EyeRegion::new(gray, landmarks, Side::Left, &mut self.calibration).and_then(|left| {
            EyeRegion::new(gray, landmarks, Side::Right, &mut self.calibration).map(|right| (left, right))
        });

        let (left, right) = match eyes {
            Ok(eyes) => eyes,
            Err(e) => {
                warn!("Skipping frame with unusable landmarks: {}", e);
                return GazeAnalysis {
                    face_detected: true,
                    calibrated: self.calibration.is_complete(),
                    ..Default::default()
                };
            }
        };

        let blink_ratio = mean(left.blink_ratio, right.blink_ratio);
        let lids_closed = left.blink_ratio.is_none() || right.blink_ratio.is_none();
        let blinking = lids_closed || blink_ratio.is_some_and(|r| r > self.config.blink_threshold);

        let horizontal_ratio = mean(left.horizontal_ratio(), right.horizontal_ratio());
        let vertical_ratio = mean(left.vertical_ratio(), right.vertical_ratio());
        let direction = horizontal_ratio.map(|h| GazeDirection::classify(h, &self.config));

        GazeAnalysis {
            face_detected: true,
            blinking,
            blink_ratio,
            horizontal_ratio,
            vertical_ratio,
            direction,
            left_pupil: left.pupil_in_frame(),
            right_pupil: right.pupil_in_frame(),
            calibrated: self.calibration.is_complete(),
            left_eye: Some(left),
            right_eye: Some(right),
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Start a new calibration session
    pub fn reset_calibration(&mut self) {
        self.calibration.reset();
    }

    pub fn config(&self) -> &GazeConfig {
        &self.config
    }
}

/// Mean of two optional values, `None` if either is missing
fn mean(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some((a? + b?) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
    use imageproc::point::Point;
    use std::collections::VecDeque;

    const FRAME_WIDTH: u32 = 200;
    const FRAME_HEIGHT: u32 = 120;

    fn eye_contour(dx: i32, dy: i32, half_height: i32) -> [PixelPoint; 6] {
        [
            PixelPoint::new(30 + dx, 50 + dy),
            PixelPoint::new(42 + dx, 50 + dy - half_height),
            PixelPoint::new(58 + dx, 50 + dy - half_height),
            PixelPoint::new(70 + dx, 50 + dy),
            PixelPoint::new(58 + dx, 50 + dy + half_height),
            PixelPoint::new(42 + dx, 50 + dy + half_height),
        ]
    }

    fn face(half_height: i32) -> FaceLandmarks {
        let mut points = vec![PixelPoint::new(100, 100); 68];
        points[36..42].copy_from_slice(&eye_contour(0, 0, half_height));
        points[42..48].copy_from_slice(&eye_contour(80, 0, half_height));
        let bbox = FaceBbox {
            x: 10,
            y: 10,
            width: 180,
            height: 100,
        };
        FaceLandmarks::new(bbox, points).unwrap()
    }

    /// Skin-toned frame with two sclera-filled eyes and dark pupils
    fn synthetic_frame(pupil_dx: i32) -> VideoFrame {
        let mut image = GrayImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Luma([170]));
        for dx in [0, 80] {
            let contour: Vec<Point<i32>> = eye_contour(dx, 0, 10)
                .iter()
                .map(|p| Point::new(p.x, p.y))
                .collect();
            draw_polygon_mut(&mut image, &contour, Luma([230]));
            draw_filled_circle_mut(&mut image, (50 + dx + pupil_dx, 50), 6, Luma([25]));
        }
        VideoFrame::from_gray(image)
    }

    /// Provider that replays one detection result per frame
    struct Scripted(VecDeque<Option<FaceLandmarks>>);

    impl LandmarkProvider for Scripted {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, GazeError> {
            Ok(self.0.pop_front().flatten())
        }
    }

    fn engine(landmarks: Option<FaceLandmarks>) -> GazeEngine<FixedLandmarks> {
        let mut provider = FixedLandmarks::none();
        provider.set(landmarks);
        GazeEngine::new(provider, GazeConfig::default()).unwrap()
    }

    fn engine_with(landmarks: FaceLandmarks) -> GazeEngine<FixedLandmarks> {
        GazeEngine::new(FixedLandmarks::new(landmarks), GazeConfig::default()).unwrap()
    }

    #[test]
    fn test_no_face_is_not_an_error() {
        let mut engine = engine(None);
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();

        assert!(!analysis.face_detected);
        assert!(!analysis.blinking);
        assert_eq!(analysis.horizontal_ratio, None);
        assert_eq!(analysis.direction, None);
        assert!(engine.calibration().samples(Side::Left).is_empty());
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let mut engine = engine(Some(face(10)));
        let frame = VideoFrame::new(Vec::new(), 0, 0, PixelFormat::Gray8);
        assert!(matches!(engine.refresh(&frame), Err(GazeError::EmptyFrame)));
    }

    #[test]
    fn test_centered_pupils_look_center() {
        let mut engine = engine(Some(face(10)));
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();

        assert!(analysis.face_detected);
        assert!(!analysis.blinking);
        assert!((analysis.blink_ratio.unwrap() - 2.0).abs() < 1e-9);
        assert!(analysis.pupils_located());
        assert!(analysis.is_center(), "{:?}", analysis.horizontal_ratio);
        assert!((analysis.horizontal_ratio.unwrap() - 0.5).abs() < 0.05);
        assert!((analysis.vertical_ratio.unwrap() - 0.5).abs() < 0.05);

        let left = analysis.left_pupil.unwrap();
        let right = analysis.right_pupil.unwrap();
        assert!((left.x - 50).abs() <= 1 && (left.y - 50).abs() <= 1);
        assert!((right.x - 130).abs() <= 1 && (right.y - 50).abs() <= 1);
    }

    #[test]
    fn test_pupils_toward_image_left_look_right() {
        let mut engine = engine(Some(face(10)));
        let analysis = engine.refresh(&synthetic_frame(-10)).unwrap();

        let ratio = analysis.horizontal_ratio.unwrap();
        assert!((ratio - 0.25).abs() < 0.05, "ratio = {}", ratio);
        assert!(analysis.is_right());
        assert_eq!(analysis.direction, Some(GazeDirection::Right));
    }

    #[test]
    fn test_pupils_toward_image_right_look_left() {
        let mut engine = engine(Some(face(10)));
        let analysis = engine.refresh(&synthetic_frame(10)).unwrap();

        let ratio = analysis.horizontal_ratio.unwrap();
        assert!((ratio - 0.75).abs() < 0.05, "ratio = {}", ratio);
        assert!(analysis.is_left());
        assert_eq!(analysis.direction, Some(GazeDirection::Left));
    }

    #[test]
    fn test_narrow_eyes_are_blinking() {
        let mut engine = engine(Some(face(3)));
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();

        // width 40 / height 6
        assert!(analysis.blink_ratio.unwrap() > 3.8);
        assert!(analysis.blinking);
    }

    #[test]
    fn test_collapsed_lids_are_blinking() {
        let mut engine = engine(Some(face(0)));
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();

        assert_eq!(analysis.blink_ratio, None);
        assert!(analysis.blinking);
    }

    #[test]
    fn test_unusable_landmarks_are_absorbed() {
        let mut points = vec![PixelPoint::new(0, 0); 68];
        points[36] = PixelPoint::new(-1000, 0);
        let landmarks = FaceLandmarks::new(FaceBbox::default(), points).unwrap();

        let mut engine = engine(Some(landmarks));
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();
        assert!(analysis.face_detected);
        assert!(analysis.left_eye.is_none());
        assert_eq!(analysis.direction, None);
    }

    #[test]
    fn test_extreme_landmark_coordinates_are_absorbed() {
        let mut points = vec![PixelPoint::new(100, 100); 68];
        points[36..42].copy_from_slice(&eye_contour(i32::MAX - 70, i32::MAX - 60, 10));
        points[42..48].copy_from_slice(&eye_contour(80, 0, 10));
        let landmarks = FaceLandmarks::new(FaceBbox::default(), points.clone()).unwrap();

        // Eye box fits the frame size but lies far outside it
        let mut engine = engine(Some(landmarks));
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();
        assert!(analysis.face_detected);
        assert_eq!(analysis.left_pupil, None);
        assert_eq!(analysis.horizontal_ratio, None);
        assert_eq!(analysis.direction, None);
        assert!(analysis.right_pupil.is_some());

        // Eye box spanning the whole coordinate range
        points[36] = PixelPoint::new(i32::MIN, i32::MIN);
        points[39] = PixelPoint::new(i32::MAX, i32::MAX);
        let landmarks = FaceLandmarks::new(FaceBbox::default(), points).unwrap();

        let mut engine = engine_with(landmarks);
        let analysis = engine.refresh(&synthetic_frame(0)).unwrap();
        assert!(analysis.face_detected);
        assert!(analysis.left_eye.is_none());
        assert_eq!(analysis.direction, None);
    }

    #[test]
    fn test_no_face_reports_calibration_state() {
        let mut script: VecDeque<_> = std::iter::repeat(Some(face(10))).take(20).collect();
        script.push_back(None);
        let mut engine = GazeEngine::new(Scripted(script), GazeConfig::default()).unwrap();

        let frame = synthetic_frame(0);
        for _ in 0..20 {
            engine.refresh(&frame).unwrap();
        }
        assert!(engine.calibration().is_complete());

        let analysis = engine.refresh(&frame).unwrap();
        assert!(!analysis.face_detected);
        assert!(analysis.calibrated);
        assert_eq!(analysis.direction, None);
    }

    #[test]
    fn test_calibration_converges() {
        let mut engine = engine(Some(face(10)));
        let frame = synthetic_frame(0);

        let mut analyses = Vec::new();
        for sequence in 0..25 {
            let frame = frame.clone().with_timing(sequence as u64 * 33_000_000, sequence);
            analyses.push(engine.refresh(&frame).unwrap());
        }

        assert!(!analyses[18].calibrated);
        assert!(analyses[19].calibrated);
        assert!(engine.calibration().is_complete());

        let left = engine.calibration().threshold(Side::Left);
        let right = engine.calibration().threshold(Side::Right);
        assert!(left <= 100 && right <= 100);

        // No more samples once complete; thresholds hold steady
        for _ in 0..5 {
            engine.refresh(&frame).unwrap();
            assert_eq!(engine.calibration().threshold(Side::Left), left);
            assert_eq!(engine.calibration().threshold(Side::Right), right);
        }
        assert!(analyses.iter().skip(19).all(|a| a.is_center()));

        engine.reset_calibration();
        assert!(!engine.calibration().is_complete());
    }
}
