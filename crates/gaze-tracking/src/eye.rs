//! Eye isolation from facial landmarks

use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tracing::trace;

use crate::calibration::Calibration;
use crate::frame::gray_at;
use crate::landmarks::{FaceLandmarks, PixelPoint, Side};
use crate::pupil::{Pupil, PupilLocator};
use crate::GazeError;

/// Margin added around the eye contour's bounding box, in pixels
pub const EYE_MARGIN: i32 = 5;

/// Value given to pixels outside the eye contour (or outside the frame)
pub const MASK_FILL: u8 = 255;

/// One eye, cut out of the frame with everything but the eye masked
#[derive(Debug, Clone)]
pub struct EyeRegion {
    /// Which eye this is
    pub side: Side,
    /// Isolated eye image
    pub image: GrayImage,
    /// Top-left of `image` in frame coordinates
    pub origin: PixelPoint,
    /// Center of `image` in local coordinates
    pub center: (f64, f64),
    /// The six contour landmarks, in frame coordinates
    pub landmark_points: [PixelPoint; 6],
    /// Eye width / height; `None` when the lids meet
    pub blink_ratio: Option<f64>,
    /// Located pupil in local coordinates
    pub pupil: Option<Pupil>,
}

impl EyeRegion {
    /// Isolate one eye and locate its pupil
    ///
    /// Feeds `calibration` while it is incomplete, then binarizes with the
    /// side's current threshold.
    pub fn new(
        frame: &GrayImage,
        landmarks: &FaceLandmarks,
        side: Side,
        calibration: &mut Calibration,
    ) -> Result<Self, GazeError> {
        let points = landmarks.eye_points(side);
        let blink_ratio = blinking_ratio(&points);
        let (image, origin) = isolate(frame, &points)?;

        if !calibration.is_complete() {
            calibration.evaluate(&image, side);
        }
        let threshold = calibration.threshold(side);
        let pupil = PupilLocator::locate(&image, threshold);

        trace!(
            ?side,
            threshold,
            width = image.width(),
            height = image.height(),
            found = pupil.is_some(),
            "eye isolated"
        );

        let center = (image.width() as f64 / 2.0, image.height() as f64 / 2.0);
        Ok(Self {
            side,
            image,
            origin,
            center,
            landmark_points: points,
            blink_ratio,
            pupil,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pupil center in local coordinates
    pub fn pupil_center(&self) -> Option<PixelPoint> {
        self.pupil.as_ref().map(|p| p.center)
    }

    /// Pupil center in frame coordinates
    pub fn pupil_in_frame(&self) -> Option<PixelPoint> {
        self.pupil_center().map(|c| c.offset(self.origin))
    }

    /// Eye image center in frame coordinates
    pub fn center_in_frame(&self) -> PixelPoint {
        self.origin
            .offset(PixelPoint::new(self.center.0 as i32, self.center.1 as i32))
    }

    /// Horizontal pupil position, 0.0 at the left contour edge, 1.0 at the right
    pub fn horizontal_ratio(&self) -> Option<f64> {
        let pupil = self.pupil_center()?;
        position_ratio(pupil.x, self.width())
    }

    /// Vertical pupil position, 0.0 at the top contour edge, 1.0 at the bottom
    pub fn vertical_ratio(&self) -> Option<f64> {
        let pupil = self.pupil_center()?;
        position_ratio(pupil.y, self.height())
    }
}

/// Pupil coordinate normalized to the contour span inside the margins
pub fn position_ratio(pupil: i32, extent: u32) -> Option<f64> {
    let span = extent as f64 - 2.0 * EYE_MARGIN as f64;
    if span <= 0.0 {
        return None;
    }
    Some(((pupil - EYE_MARGIN) as f64 / span).clamp(0.0, 1.0))
}

/// Width of the eye divided by its height
///
/// Corners are points 0 and 3; height runs between the midpoints of the upper
/// (1, 2) and lower (5, 4) lids. `None` when the height is zero.
pub fn blinking_ratio(points: &[PixelPoint; 6]) -> Option<f64> {
    let left = points[0];
    let right = points[3];
    let top = points[1].midpoint(&points[2]);
    let bottom = points[5].midpoint(&points[4]);

    let eye_width = left.distance(&right);
    let eye_height = top.distance(&bottom);

    if eye_height == 0.0 {
        return None;
    }
    Some(eye_width / eye_height)
}

/// Mask everything outside the eye contour and crop around it
///
/// Returns the crop and its top-left corner in frame coordinates. The crop
/// always spans the full margin-expanded box; frame reads are bounds-checked
/// and pixels beyond the frame keep the mask fill.
pub fn isolate(frame: &GrayImage, points: &[PixelPoint; 6]) -> Result<(GrayImage, PixelPoint), GazeError> {
    let margin = i64::from(EYE_MARGIN);
    let xs = points.iter().map(|p| i64::from(p.x));
    let ys = points.iter().map(|p| i64::from(p.y));
    let min_x = xs.clone().min().unwrap_or_default() - margin;
    let max_x = xs.max().unwrap_or_default() + margin;
    let min_y = ys.clone().min().unwrap_or_default() - margin;
    let max_y = ys.max().unwrap_or_default() + margin;

    let (width, height) = (max_x - min_x, max_y - min_y);
    if width > i64::from(frame.width()) || height > i64::from(frame.height()) {
        return Err(GazeError::InvalidLandmarks(format!(
            "eye box {}x{} exceeds frame {}x{}",
            width,
            height,
            frame.width(),
            frame.height()
        )));
    }
    let (width, height) = (width as u32, height as u32);

    let origin = match (i32::try_from(min_x), i32::try_from(min_y)) {
        (Ok(x), Ok(y)) => PixelPoint::new(x, y),
        _ => {
            return Err(GazeError::InvalidLandmarks(format!(
                "eye box origin ({}, {}) out of coordinate range",
                min_x, min_y
            )))
        }
    };
    let mask = contour_mask(width, height, points, origin);

    let mut eye = GrayImage::from_pixel(width, height, Luma([MASK_FILL]));
    for (x, y, pixel) in eye.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] == 0 {
            continue;
        }
        if let Some(value) = gray_at(frame, min_x + i64::from(x), min_y + i64::from(y)) {
            *pixel = Luma([value]);
        }
    }

    Ok((eye, origin))
}

/// Filled contour polygon in crop-local coordinates
fn contour_mask(width: u32, height: u32, points: &[PixelPoint; 6], origin: PixelPoint) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for p in points {
        let local = Point::new(p.x - origin.x, p.y - origin.y);
        if polygon.last() != Some(&local) {
            polygon.push(local);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    match polygon.len() {
        0 => {}
        1 => mask.put_pixel(polygon[0].x as u32, polygon[0].y as u32, Luma([255])),
        _ => draw_polygon_mut(&mut mask, &polygon, Luma([255])),
    }
    mask
}
