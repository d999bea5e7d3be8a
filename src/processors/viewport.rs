//! Bidirectional mapping between image-pixel and display coordinates.
//!
//! Fragments live in source-image pixel space; the viewer pans, zooms, and
//! letterboxes the image into a display rectangle. Some detector outputs
//! also carry a systematic calibration bias against the true pixel grid, so
//! a linear correction is applied to logical boxes before display scaling,
//! giving operators a knob without touching the rest of the pipeline.

use crate::processors::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Lower clamp for the zoom factor.
pub const MIN_ZOOM: f32 = 0.1;
/// Upper clamp for the zoom factor.
pub const MAX_ZOOM: f32 = 10.0;

/// Operator-configurable linear correction applied to logical boxes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Calibration {
    /// Horizontal offset in source pixels.
    #[serde(default)]
    pub offset_x: f32,
    /// Vertical offset in source pixels.
    #[serde(default)]
    pub offset_y: f32,
    /// Horizontal scale correction.
    #[serde(default = "Calibration::default_scale")]
    pub scale_x: f32,
    /// Vertical scale correction.
    #[serde(default = "Calibration::default_scale")]
    pub scale_y: f32,
}

impl Calibration {
    fn default_scale() -> f32 {
        1.0
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Per-document view state: zoom, pan, and calibration.
///
/// One viewport exists per open document; it resets to identity when a new
/// image loads.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: f32,
    pan: (f32, f32),
    calibration: Calibration,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: (0.0, 0.0),
            calibration: Calibration::default(),
        }
    }
}

impl Viewport {
    /// Creates a viewport with identity zoom, pan, and calibration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a viewport with a calibration correction installed.
    pub fn with_calibration(calibration: Calibration) -> Self {
        Self {
            calibration,
            ..Self::default()
        }
    }

    /// Current zoom factor.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Current pan offset in display pixels.
    pub fn pan(&self) -> (f32, f32) {
        self.pan
    }

    /// Sets the zoom factor, clamped to `[0.1, 10.0]`.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Adds to the pan offset, in display pixels.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan.0 += dx;
        self.pan.1 += dy;
    }

    /// Resets zoom and pan to identity; called when a new image loads.
    /// Calibration survives the reset, it corrects the detector, not the view.
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = (0.0, 0.0);
    }

    /// Maps a logical box into display coordinates.
    ///
    /// Applies the calibration correction in source space, scales into the
    /// display rectangle, then applies zoom and pan.
    pub fn to_display(&self, rect: &Rect, image_size: (u32, u32), display_rect: &Rect) -> Rect {
        let (sx, sy) = self.display_scale(image_size, display_rect);
        let corrected = self.apply_calibration(rect);
        Rect {
            x1: display_rect.x1 + corrected.x1 * sx * self.zoom + self.pan.0,
            y1: display_rect.y1 + corrected.y1 * sy * self.zoom + self.pan.1,
            x2: display_rect.x1 + corrected.x2 * sx * self.zoom + self.pan.0,
            y2: display_rect.y1 + corrected.y2 * sy * self.zoom + self.pan.1,
        }
    }

    /// Maps a display click back to image coordinates; exact inverse of
    /// [`Viewport::to_display`] for points.
    pub fn to_image(&self, p: Point, image_size: (u32, u32), display_rect: &Rect) -> Point {
        let (sx, sy) = self.display_scale(image_size, display_rect);
        let x = (p.x - self.pan.0 - display_rect.x1) / (sx * self.zoom);
        let y = (p.y - self.pan.1 - display_rect.y1) / (sy * self.zoom);
        Point::new(
            (x - self.calibration.offset_x) / self.calibration.scale_x,
            (y - self.calibration.offset_y) / self.calibration.scale_y,
        )
    }

    fn display_scale(&self, image_size: (u32, u32), display_rect: &Rect) -> (f32, f32) {
        (
            display_rect.width() / image_size.0 as f32,
            display_rect.height() / image_size.1 as f32,
        )
    }

    fn apply_calibration(&self, rect: &Rect) -> Rect {
        rect.scale(self.calibration.scale_x, self.calibration.scale_y)
            .translate(self.calibration.offset_x, self.calibration.offset_y)
    }
}
