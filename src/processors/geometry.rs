//! Axis-aligned geometry primitives for fragment clustering.
//!
//! Detection engines return either quadrilateral/polygon coordinates or plain
//! boxes; everything downstream of ingestion works on axis-aligned rectangles
//! in source-image pixel space. This module provides the rectangle type and
//! the overlap/gap predicates the line sorter and block clusterer are built on.

use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in source-image pixel space.
///
/// The constructor normalizes coordinate order, so `x1 <= x2` and `y1 <= y2`
/// always hold for a constructed rectangle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

impl Rect {
    /// Creates a rectangle from two corner coordinates, normalizing order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Reduces a polygon to its axis-aligned bounding box.
    ///
    /// Returns `None` for an empty point list or if any coordinate is not
    /// finite; malformed geometry is recovered locally by the caller, never
    /// propagated as an error.
    pub fn from_polygon(points: &[[f32; 2]]) -> Option<Self> {
        if points.is_empty() || points.iter().flatten().any(|v| !v.is_finite()) {
            return None;
        }
        let mut x_min = f32::INFINITY;
        let mut y_min = f32::INFINITY;
        let mut x_max = f32::NEG_INFINITY;
        let mut y_max = f32::NEG_INFINITY;
        for p in points {
            x_min = x_min.min(p[0]);
            y_min = y_min.min(p[1]);
            x_max = x_max.max(p[0]);
            y_max = y_max.max(p[1]);
        }
        Some(Self::new(x_min, y_min, x_max, y_max))
    }

    /// Width of the rectangle.
    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Height of the rectangle.
    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Geometric center of the rectangle.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Computes the union (minimum enclosing rectangle) of two rectangles.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Length of the overlap between the two vertical extents.
    ///
    /// Returns 0.0 when the extents do not intersect.
    pub fn vertical_overlap(&self, other: &Self) -> f32 {
        (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0)
    }

    /// Length of the overlap between the two horizontal extents.
    ///
    /// Returns 0.0 when the extents do not intersect.
    pub fn horizontal_overlap(&self, other: &Self) -> f32 {
        (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0)
    }

    /// Distance between the two horizontal extents, 0.0 if they overlap.
    pub fn horizontal_gap(&self, other: &Self) -> f32 {
        (self.x1.max(other.x1) - self.x2.min(other.x2)).max(0.0)
    }

    /// Distance between the two vertical extents, 0.0 if they overlap.
    pub fn vertical_gap(&self, other: &Self) -> f32 {
        (self.y1.max(other.y1) - self.y2.min(other.y2)).max(0.0)
    }

    /// Checks whether a point lies inside the rectangle (edges inclusive).
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    /// Returns a rectangle with both axes scaled by the given factors.
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    /// Returns a rectangle translated by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }
}
