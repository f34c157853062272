// SPDX-License-Identifier: GPL-3.0-only

//! Core types for recognition results
//!
//! Geometry is expressed in analysis-resolution pixel coordinates: the
//! coordinate space of the upright color buffer handed to the recognizer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle given by its edges
///
/// Edges are inclusive: a box with `left == right` is a vertical line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Smallest box enclosing all points; `None` for an empty slice
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self::new(first.x, first.y, first.x, first.y);
        Some(points[1..].iter().fold(init, |b, p| {
            Self::new(
                b.left.min(p.x),
                b.top.min(p.y),
                b.right.max(p.x),
                b.bottom.max(p.y),
            )
        }))
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Finite edges with non-negative width and height
    pub fn is_well_formed(&self) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.is_finite())
            && self.width() >= 0.0
            && self.height() >= 0.0
    }

    /// Well formed and enclosing a positive area
    pub fn has_area(&self) -> bool {
        self.is_well_formed() && self.width() > 0.0 && self.height() > 0.0
    }

    /// Every edge of `other` lies within this box (inclusive)
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.left <= other.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// The two boxes share at least one point
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        other.left <= self.right
            && other.right >= self.left
            && other.top <= self.bottom
            && other.bottom >= self.top
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Corners clockwise from top-left
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
            Point::new(self.left, self.bottom),
        ]
    }
}

/// Where a detection was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Axis-aligned bounding rectangle
    Rect(BoundingBox),
    /// Ordered corner points (e.g. the four corners of a QR code)
    Corners(Vec<Point>),
}

impl Geometry {
    /// Axis-aligned bounds of the geometry
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Geometry::Rect(b) => Some(*b),
            Geometry::Corners(points) => BoundingBox::from_points(points),
        }
    }

    /// Points to draw for an overlay
    pub fn points(&self) -> Vec<Point> {
        match self {
            Geometry::Rect(b) => b.corners().to_vec(),
            Geometry::Corners(points) => points.clone(),
        }
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        match self {
            Geometry::Rect(b) => Geometry::Rect(b.translated(dx, dy)),
            Geometry::Corners(points) => Geometry::Corners(
                points
                    .iter()
                    .map(|p| Point::new(p.x + dx, p.y + dy))
                    .collect(),
            ),
        }
    }
}

/// Kind of code or text a detection came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    QrCode,
    /// Recognized text (OCR)
    Text,
    /// Any other symbology, named by the recognizer
    Other(String),
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarcodeFormat::QrCode => write!(f, "QR_CODE"),
            BarcodeFormat::Text => write!(f, "TEXT"),
            BarcodeFormat::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One raw recognizer result
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Decoded content
    pub value: String,
    /// Location in analysis-resolution coordinates, if the recognizer reports one
    pub geometry: Option<Geometry>,
    pub format: BarcodeFormat,
    /// Monotonic arrival time in milliseconds
    pub timestamp_ms: u64,
}

impl Detection {
    pub fn new(value: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            value: value.into(),
            geometry: None,
            format,
            timestamp_ms: 0,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}
