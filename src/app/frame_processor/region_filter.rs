// SPDX-License-Identifier: GPL-3.0-only

//! Region-of-interest gating and preview coordinate mapping
//!
//! The accept/reject decision always runs in analysis-resolution
//! coordinates. A region configured in display coordinates is mapped into
//! analysis space once, when the filter is built. Mapping detections back
//! to the display is only needed for drawing overlays.

use crate::app::frame_processor::types::{BoundingBox, Geometry, Point};
use crate::backends::camera::types::Resolution;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the analysis image is fitted into the preview surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitMode {
    /// Scale to cover the preview, cropping the overflow (centered)
    #[default]
    Fill,
    /// Scale to fit inside the preview, letterboxing the rest (centered)
    Fit,
}

/// Region of interest in display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub rect: BoundingBox,
    /// Require full containment instead of any overlap
    pub strict: bool,
}

impl RegionOfInterest {
    pub fn new(rect: BoundingBox, strict: bool) -> Self {
        Self { rect, strict }
    }
}

/// Uniform scale plus centering offset between analysis and display space
///
/// `display = analysis * scale - offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTransform {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
}

impl Default for PreviewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl PreviewTransform {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Transform for showing `source` inside `dest` with the given fit mode
    ///
    /// Empty resolutions yield the identity transform.
    pub fn new(source: Resolution, dest: Resolution, fit: FitMode) -> Self {
        if source.is_empty() || dest.is_empty() {
            return Self::identity();
        }
        let (sw, sh) = (source.width as f32, source.height as f32);
        let (dw, dh) = (dest.width as f32, dest.height as f32);
        let scale_x = dw / sw;
        let scale_y = dh / sh;
        let scale = match fit {
            FitMode::Fill => scale_x.max(scale_y),
            FitMode::Fit => scale_x.min(scale_y),
        };

        Self {
            scale,
            offset_x: (sw * scale - dw) / 2.0,
            offset_y: (sh * scale - dh) / 2.0,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Offset subtracted after scaling (negative when letterboxed)
    pub fn offset(&self) -> (f32, f32) {
        (self.offset_x, self.offset_y)
    }

    pub fn to_display(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale - self.offset_x,
            p.y * self.scale - self.offset_y,
        )
    }

    pub fn to_analysis(&self, p: Point) -> Point {
        Point::new(
            (p.x + self.offset_x) / self.scale,
            (p.y + self.offset_y) / self.scale,
        )
    }

    pub fn box_to_analysis(&self, b: &BoundingBox) -> BoundingBox {
        let tl = self.to_analysis(Point::new(b.left, b.top));
        let br = self.to_analysis(Point::new(b.right, b.bottom));
        BoundingBox::new(tl.x, tl.y, br.x, br.y)
    }

    /// Geometry points mapped to the display, for overlay drawing
    pub fn geometry_to_display(&self, geometry: &Geometry) -> Vec<Point> {
        geometry
            .points()
            .into_iter()
            .map(|p| self.to_display(p))
            .collect()
    }
}

/// Map a point from the analysis resolution to the display resolution
pub fn rescale(point: Point, source: Resolution, dest: Resolution, fit: FitMode) -> Point {
    PreviewTransform::new(source, dest, fit).to_display(point)
}

/// Decide whether a detection's geometry qualifies against a region
///
/// Both arguments are in the same coordinate space. A region without area
/// accepts nothing. A detection that carries no geometry is accepted: its
/// recognizer was either given the whole frame with no location to report,
/// or was already restricted to the region by cropping.
pub fn accepts(geometry: Option<&Geometry>, roi: &BoundingBox, strict: bool) -> bool {
    if !roi.has_area() {
        return false;
    }
    let Some(geometry) = geometry else {
        return true;
    };
    let Some(bounds) = geometry.bounding_box().filter(BoundingBox::is_well_formed) else {
        return false;
    };

    if strict {
        roi.contains(&bounds)
    } else {
        roi.intersects(&bounds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Region {
    /// No region restriction configured
    Everything,
    /// Region in analysis coordinates
    Rect(BoundingBox),
    /// Degenerate region; rejects every detection
    Nothing,
}

/// Gate that decides which detections reach the stabilizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFilter {
    region: Region,
    strict: bool,
}

impl RegionFilter {
    /// Filter that accepts every detection
    pub fn unrestricted() -> Self {
        Self {
            region: Region::Everything,
            strict: false,
        }
    }

    /// Filter for a region given in display coordinates
    pub fn new(roi: RegionOfInterest, transform: &PreviewTransform) -> Self {
        Self::in_analysis_space(transform.box_to_analysis(&roi.rect), roi.strict)
    }

    /// Filter for a region already in analysis coordinates
    pub fn in_analysis_space(rect: BoundingBox, strict: bool) -> Self {
        let region = if rect.has_area() {
            debug!(
                left = rect.left,
                top = rect.top,
                right = rect.right,
                bottom = rect.bottom,
                strict,
                "Region filter configured"
            );
            Region::Rect(rect)
        } else {
            warn!(?rect, "Region of interest has no area; all detections will be rejected");
            Region::Nothing
        };
        Self { region, strict }
    }

    /// Region in analysis coordinates, if one restricts detections
    pub fn region(&self) -> Option<BoundingBox> {
        match self.region {
            Region::Rect(rect) => Some(rect),
            Region::Everything | Region::Nothing => None,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn rejects_everything(&self) -> bool {
        self.region == Region::Nothing
    }

    pub fn accepts(&self, geometry: Option<&Geometry>) -> bool {
        match &self.region {
            Region::Everything => true,
            Region::Nothing => false,
            Region::Rect(rect) => accepts(geometry, rect, self.strict),
        }
    }
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self::unrestricted()
    }
}
