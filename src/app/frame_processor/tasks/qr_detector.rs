// SPDX-License-Identifier: GPL-3.0-only

//! QR code recognition
//!
//! Implements [`Recognizer`] with the rqrr crate. Images are reduced to
//! grayscale and downscaled to a maximum dimension before the grid search,
//! and the reported corners are scaled back to the input image.

use crate::app::frame_processor::tasks::Recognizer;
use crate::app::frame_processor::types::{BarcodeFormat, Detection, Geometry, Point};
use crate::constants::DEFAULT_MAX_RECOGNIZER_DIMENSION;
use crate::errors::RecognizerError;
use crate::media::ColorBuffer;
use tracing::{debug, trace};

/// QR code recognizer
///
/// Optimized for real-time use through downscaling; QR codes in a scanning
/// preview are usually large enough to survive it.
pub struct QrRecognizer {
    /// Maximum dimension for processing (images are downscaled to this)
    max_dimension: u32,
}

impl Default for QrRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl QrRecognizer {
    pub fn new() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_RECOGNIZER_DIMENSION)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl Recognizer for QrRecognizer {
    fn name(&self) -> &str {
        "qr"
    }

    fn recognize(&mut self, image: &ColorBuffer) -> Result<Vec<Detection>, RecognizerError> {
        if image.is_empty() {
            return Ok(Vec::new());
        }
        let start = std::time::Instant::now();

        let (gray, proc_width, proc_height, scale) = grayscale_for_detection(image, self.max_dimension);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            proc_width as usize,
            proc_height as usize,
            |x, y| gray[y * proc_width as usize + x],
        );
        let grids = prepared.detect_grids();

        trace!(
            proc_width,
            proc_height,
            scale,
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis() as u64,
            "QR grid search complete"
        );

        let mut detections = Vec::with_capacity(grids.len());
        let mut last_error = None;
        for grid in &grids {
            let content = match grid.decode() {
                Ok((_meta, content)) => content,
                Err(e) => {
                    debug!(error = %e, "Failed to decode QR code");
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let corners = grid
                .bounds
                .iter()
                .map(|p| Point::new(p.x as f32 * scale, p.y as f32 * scale))
                .collect();

            debug!(content = %content, "Detected QR code");
            detections.push(
                Detection::new(content, BarcodeFormat::QrCode)
                    .with_geometry(Geometry::Corners(corners)),
            );
        }

        match last_error {
            Some(e) if detections.is_empty() => Err(RecognizerError::Decode(e)),
            _ => Ok(detections),
        }
    }
}

/// Grayscale copy of the image, downscaled if it exceeds `max_dimension`
///
/// Returns the pixels, their dimensions and the factor that maps processed
/// coordinates back to the input image.
fn grayscale_for_detection(image: &ColorBuffer, max_dimension: u32) -> (Vec<u8>, u32, u32, f32) {
    let (width, height) = (image.width(), image.height());
    if width <= max_dimension && height <= max_dimension {
        let mut gray = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                gray.push(image.luma(x, y));
            }
        }
        return (gray, width, height, 1.0);
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    (
        downscale_luma(image, new_width, new_height),
        new_width,
        new_height,
        scale,
    )
}

/// Downscale to grayscale using bilinear interpolation
fn downscale_luma(image: &ColorBuffer, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = image.width();
    let src_height = image.height();
    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = (src_x as u32).min(src_width - 1);
            let y0 = (src_y as u32).min(src_height - 1);
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let p00 = image.luma(x0, y0) as f32;
            let p01 = image.luma(x1, y0) as f32;
            let p10 = image.luma(x0, y1) as f32;
            let p11 = image.luma(x1, y1) as f32;

            let value = p00 * (1.0 - x_frac) * (1.0 - y_frac)
                + p01 * x_frac * (1.0 - y_frac)
                + p10 * (1.0 - x_frac) * y_frac
                + p11 * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}
