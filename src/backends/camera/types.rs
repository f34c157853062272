// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera frame sources

//! Shared types for camera frames

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Sensor rotation in degrees (clockwise)
///
/// Mobile sensors are commonly mounted at 90° or 270° relative to the
/// display. The rotation travels with each frame so the converter can
/// write its output upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resolution after applying a sensor rotation
    pub fn rotated(self, rotation: SensorRotation) -> Self {
        if rotation.swaps_dimensions() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One plane of a planar YUV frame
///
/// Chroma planes from real hardware are frequently interleaved views into
/// the same memory (pixel stride 2) with padded rows, so both strides are
/// carried explicitly.
#[derive(Clone)]
pub struct Plane {
    pub data: Arc<[u8]>,
    /// Bytes between the starts of two consecutive rows
    pub row_stride: usize,
    /// Bytes between two consecutive samples in a row
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Arc<[u8]>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Tightly packed plane (pixel stride 1, row stride = width)
    pub fn packed(data: impl Into<Arc<[u8]>>, width: usize) -> Self {
        Self::new(data.into(), width, 1)
    }

    /// Sample at (x, y), honoring both strides
    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.row_stride + x * self.pixel_stride]
    }
}

impl std::fmt::Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plane({} bytes, row_stride={}, pixel_stride={})",
            self.data.len(),
            self.row_stride,
            self.pixel_stride
        )
    }
}

/// A planar YUV 4:2:0 camera frame
///
/// Owned by the camera source. The analyzer only borrows it for the
/// duration of one conversion.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rotation: SensorRotation,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    /// Time when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl Frame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Resolution of the upright image the converter produces
    pub fn upright_resolution(&self) -> Resolution {
        self.resolution().rotated(self.rotation)
    }

    /// Chroma plane dimensions covering every luma sample (rounded up for odd sizes)
    pub fn chroma_dimensions(&self) -> (usize, usize) {
        (
            (self.width as usize).div_ceil(2),
            (self.height as usize).div_ceil(2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(SensorRotation::from_degrees_int(90), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees_int(-90), SensorRotation::Rotate270);
        assert_eq!(SensorRotation::from_degrees_int(540), SensorRotation::Rotate180);
        assert_eq!(SensorRotation::from_degrees_int(45), SensorRotation::None);
    }

    #[test]
    fn test_resolution_rotated() {
        let res = Resolution::new(640, 480);
        assert_eq!(res.rotated(SensorRotation::Rotate90), Resolution::new(480, 640));
        assert_eq!(res.rotated(SensorRotation::Rotate180), res);
    }

    #[test]
    fn test_plane_sample_honors_strides() {
        // Two rows, 2 samples each, pixel stride 2 and 2 bytes of row padding
        let data: Vec<u8> = vec![1, 0, 2, 0, 9, 9, 3, 0, 4, 0, 9, 9];
        let plane = Plane::new(Arc::from(data.as_slice()), 6, 2);
        assert_eq!(plane.sample(0, 0), 1);
        assert_eq!(plane.sample(1, 0), 2);
        assert_eq!(plane.sample(0, 1), 3);
        assert_eq!(plane.sample(1, 1), 4);
    }

    #[test]
    fn test_chroma_dimensions_round_up() {
        let frame = Frame {
            width: 5,
            height: 3,
            rotation: SensorRotation::None,
            y: Plane::packed(vec![0u8; 15], 5),
            u: Plane::packed(vec![0u8; 6], 3),
            v: Plane::packed(vec![0u8; 6], 3),
            captured_at: Instant::now(),
        };
        assert_eq!(frame.chroma_dimensions(), (3, 2));
    }
}
