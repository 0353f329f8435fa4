//! Pupil detection inside an isolated eye image

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::erode;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::landmarks::PixelPoint;

/// Gaussian sigma applied before binarization
pub const BLUR_SIGMA: f32 = 1.0;

/// 3x3 erosion passes applied to the binarized mask
pub const EROSION_ITERATIONS: u8 = 3;

/// Ellipse fitted to the pupil contour, in eye-image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: (f64, f64),
    /// Semi-axis lengths (major, minor)
    pub axes: (f64, f64),
    /// Orientation of the major axis, radians from +x
    pub angle: f64,
}

/// Located pupil in eye-image coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pupil {
    /// Pupil center (contour centroid, truncated)
    pub center: PixelPoint,
    /// Outline of the selected blob (for visualization)
    pub contour: Vec<PixelPoint>,
    /// Best-fit ellipse (for visualization)
    pub ellipse: Option<Ellipse>,
}

/// Binarizes an eye image and extracts the pupil blob
pub struct PupilLocator;

impl PupilLocator {
    /// Blur and threshold an eye image
    ///
    /// Pixels darker than `threshold` become foreground (255).
    pub fn binarize(eye: &GrayImage, threshold: u8) -> GrayImage {
        let mut mask = gaussian_blur_f32(eye, BLUR_SIGMA);
        for pixel in mask.pixels_mut() {
            pixel[0] = if pixel[0] < threshold { 255 } else { 0 };
        }
        mask
    }

    /// Locate the pupil center, `None` when no usable blob exists
    pub fn locate(eye: &GrayImage, threshold: u8) -> Option<Pupil> {
        if eye.width() == 0 || eye.height() == 0 {
            return None;
        }

        let mask = Self::binarize(eye, threshold);
        let mask = erode(&mask, Norm::LInf, EROSION_ITERATIONS);
        Self::largest_blob(&mask)
    }

    /// Pick the outer contour with the largest area and take its centroid
    fn largest_blob(mask: &GrayImage) -> Option<Pupil> {
        let mut best: Option<(Vec<Point<i32>>, Moments)> = None;

        for contour in find_contours::<i32>(mask) {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            let moments = Moments::of_polygon(&contour.points);
            let larger = match &best {
                Some((_, current)) => moments.area() > current.area(),
                None => true,
            };
            if larger {
                best = Some((contour.points, moments));
            }
        }

        let (points, moments) = best?;
        let (cx, cy) = moments.centroid()?;
        trace!(cx, cy, area = moments.area(), "pupil blob");

        // Centroid of in-bounds vertices stays within the image
        let max_x = mask.width().saturating_sub(1) as f64;
        let max_y = mask.height().saturating_sub(1) as f64;
        let center = PixelPoint::new(cx.clamp(0.0, max_x) as i32, cy.clamp(0.0, max_y) as i32);

        Some(Pupil {
            center,
            contour: points.iter().map(|p| PixelPoint::new(p.x, p.y)).collect(),
            ellipse: moments.ellipse(),
        })
    }
}

/// Raw polygon moments up to second order (Green's theorem)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Moments {
    m00: f64,
    m10: f64,
    m01: f64,
    m20: f64,
    m11: f64,
    m02: f64,
}

impl Moments {
    pub(crate) fn of_polygon(points: &[Point<i32>]) -> Self {
        let mut m = Moments::default();
        let n = points.len();
        if n < 3 {
            return m;
        }

        for i in 0..n {
            let (x0, y0) = (points[i].x as f64, points[i].y as f64);
            let (x1, y1) = (points[(i + 1) % n].x as f64, points[(i + 1) % n].y as f64);
            let cross = x0 * y1 - x1 * y0;

            m.m00 += cross;
            m.m10 += cross * (x0 + x1);
            m.m01 += cross * (y0 + y1);
            m.m20 += cross * (x0 * x0 + x0 * x1 + x1 * x1);
            m.m02 += cross * (y0 * y0 + y0 * y1 + y1 * y1);
            m.m11 += cross * (x0 * y1 + 2.0 * x0 * y0 + 2.0 * x1 * y1 + x1 * y0);
        }

        m.m00 /= 2.0;
        m.m10 /= 6.0;
        m.m01 /= 6.0;
        m.m20 /= 12.0;
        m.m02 /= 12.0;
        m.m11 /= 24.0;
        m
    }

    /// Unsigned enclosed area
    pub(crate) fn area(&self) -> f64 {
        self.m00.abs()
    }

    pub(crate) fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 == 0.0 {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Ellipse with the same second-order central moments
    pub(crate) fn ellipse(&self) -> Option<Ellipse> {
        let (cx, cy) = self.centroid()?;

        let mu20 = self.m20 / self.m00 - cx * cx;
        let mu02 = self.m02 / self.m00 - cy * cy;
        let mu11 = self.m11 / self.m00 - cx * cy;

        let mean = (mu20 + mu02) / 2.0;
        let spread = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
        let major = mean + spread;
        let minor = mean - spread;
        if !(minor >= 0.0 && major > 0.0) {
            return None;
        }

        Some(Ellipse {
            center: (cx, cy),
            axes: (2.0 * major.sqrt(), 2.0 * minor.sqrt()),
            angle: 0.5 * (2.0 * mu11).atan2(mu20 - mu02),
        })
    }
}

/// Fraction of foreground pixels in a binary mask
pub(crate) fn foreground_fraction(mask: &GrayImage) -> f64 {
    let total = mask.width() as usize * mask.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let dark = mask.pixels().filter(|&&Luma([v])| v != 0).count();
    dark as f64 / total as f64
}
