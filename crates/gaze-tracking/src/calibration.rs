//! Per-eye binarization threshold calibration
//!
//! Eye coloration, lighting and exposure vary per person and session, so the
//! pupil threshold is searched for on live eye images. Each side keeps a short
//! rolling history of winning thresholds; the working threshold is their mean.

use image::GrayImage;
use ring_buffer::RingBuffer;
use tracing::{info, trace};

use crate::eye::EYE_MARGIN;
use crate::landmarks::Side;
use crate::pupil::{foreground_fraction, PupilLocator};
use crate::{GazeConfig, GazeError};

/// Candidate thresholds tried by the search: 5, 10, ..., 95
pub const THRESHOLD_CANDIDATES: std::ops::RangeInclusive<u8> = 5..=95;

/// Step between candidate thresholds
pub const THRESHOLD_STEP: usize = 5;

/// Rolling threshold histories for both eyes
#[derive(Debug, Clone)]
pub struct Calibration {
    left: RingBuffer<u8>,
    right: RingBuffer<u8>,
    target_iris_ratio: f64,
    default_threshold: u8,
}

impl Calibration {
    /// Create an empty calibration session
    pub fn new(config: &GazeConfig) -> Result<Self, GazeError> {
        config.validate()?;
        Ok(Self {
            left: RingBuffer::new(config.calibration_frames)?,
            right: RingBuffer::new(config.calibration_frames)?,
            target_iris_ratio: config.target_iris_ratio,
            default_threshold: config.default_threshold,
        })
    }

    fn history(&self, side: Side) -> &RingBuffer<u8> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// True once both eyes have a full history
    pub fn is_complete(&self) -> bool {
        self.left.is_full() && self.right.is_full()
    }

    /// Working threshold for one eye: rounded mean of its history
    pub fn threshold(&self, side: Side) -> u8 {
        let history = self.history(side);
        if history.is_empty() {
            return self.default_threshold;
        }

        let sum: u32 = history.iter().map(|&t| t as u32).sum();
        (sum as f64 / history.len() as f64).round() as u8
    }

    /// Thresholds collected so far for one eye, oldest first
    pub fn samples(&self, side: Side) -> Vec<u8> {
        self.history(side).iter().copied().collect()
    }

    /// Search the best threshold for an eye image and record it
    pub fn evaluate(&mut self, eye: &GrayImage, side: Side) {
        let was_complete = self.is_complete();
        let best = Self::find_best_threshold(eye, self.target_iris_ratio);

        match side {
            Side::Left => self.left.push(best),
            Side::Right => self.right.push(best),
        };
        trace!(?side, best, samples = self.history(side).len(), "calibration sample");

        if !was_complete && self.is_complete() {
            info!(
                left = self.threshold(Side::Left),
                right = self.threshold(Side::Right),
                "calibration complete"
            );
        }
    }

    /// Candidate whose dark-pixel fraction is closest to the target
    ///
    /// Ties go to the lowest candidate.
    pub fn find_best_threshold(eye: &GrayImage, target_iris_ratio: f64) -> u8 {
        let mut best = (*THRESHOLD_CANDIDATES.start(), f64::INFINITY);

        for threshold in THRESHOLD_CANDIDATES.step_by(THRESHOLD_STEP) {
            let mask = PupilLocator::binarize(eye, threshold);
            let score = (Self::iris_size(&mask) - target_iris_ratio).abs();
            trace!(threshold, score, "threshold candidate");
            if score < best.1 {
                best = (threshold, score);
            }
        }
        best.0
    }

    /// Dark fraction of a binarized eye, ignoring the masked border ring
    pub fn iris_size(mask: &GrayImage) -> f64 {
        let margin = EYE_MARGIN as u32;
        let (width, height) = mask.dimensions();
        if width <= 2 * margin || height <= 2 * margin {
            return foreground_fraction(mask);
        }

        let interior =
            image::imageops::crop_imm(mask, margin, margin, width - 2 * margin, height - 2 * margin)
                .to_image();
        foreground_fraction(&interior)
    }

    /// Drop all samples (new session)
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
