//! Video frame types and grayscale conversion

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::GazeError;

/// Pixel layout of a raw frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// One byte per pixel
    Gray8,
    /// R, G, B byte order
    #[default]
    Rgb24,
    /// B, G, R byte order (OpenCV-style captures)
    Bgr24,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
        }
    }
}

/// Decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data (width * height * channels)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Byte layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw pixel data
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            timestamp_ns: 0,
            sequence: 0,
        }
    }

    /// Wrap an existing grayscale image
    pub fn from_gray(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, PixelFormat::Gray8)
    }

    /// Attach capture metadata
    pub fn with_timing(mut self, timestamp_ns: u64, sequence: u32) -> Self {
        self.timestamp_ns = timestamp_ns;
        self.sequence = sequence;
        self
    }

    /// Check that the frame is non-empty and its buffer matches its dimensions
    pub fn validate(&self) -> Result<(), GazeError> {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return Err(GazeError::EmptyFrame);
        }

        let expected = self.width as usize * self.height as usize * self.format.channels();
        if self.data.len() != expected {
            return Err(GazeError::FrameSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Get pixel channels at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        self.data.get(idx..idx + channels)
    }

    /// Convert to a grayscale image
    pub fn to_gray_image(&self) -> Result<GrayImage, GazeError> {
        self.validate()?;

        let gray: Vec<u8> = match self.format {
            PixelFormat::Gray8 => self.data.clone(),
            PixelFormat::Rgb24 => self
                .data
                .chunks_exact(3)
                .map(|p| luminance(p[0], p[1], p[2]))
                .collect(),
            PixelFormat::Bgr24 => self
                .data
                .chunks_exact(3)
                .map(|p| luminance(p[2], p[1], p[0]))
                .collect(),
        };

        GrayImage::from_raw(self.width, self.height, gray).ok_or(GazeError::FrameSize {
            expected: self.width as usize * self.height as usize,
            actual: self.data.len() / self.format.channels(),
        })
    }
}

/// Luminance formula: 0.299*R + 0.587*G + 0.114*B
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114).round() as u8
}

/// Read one pixel of a grayscale image, `None` outside its bounds
pub(crate) fn gray_at(image: &GrayImage, x: i64, y: i64) -> Option<u8> {
    if x < 0 || y < 0 {
        return None;
    }
    let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
    image.get_pixel_checked(x, y).map(|&Luma([v])| v)
}
