// SPDX-License-Identifier: GPL-3.0-only

//! Recognizer abstraction
//!
//! A recognizer turns one upright RGBA image into zero or more detections.
//! It runs on the recognition worker thread, so it may take as long as it
//! needs; a failure only costs the current frame.

pub mod qr_detector;

pub use qr_detector::QrRecognizer;

use crate::app::frame_processor::types::Detection;
use crate::errors::RecognizerError;
use crate::media::ColorBuffer;

/// Barcode or text recognizer
pub trait Recognizer: Send {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Recognize codes in an image
    ///
    /// Geometry in the returned detections is in the image's pixel
    /// coordinates. Timestamps are assigned by the caller.
    fn recognize(&mut self, image: &ColorBuffer) -> Result<Vec<Detection>, RecognizerError>;
}

impl<F> Recognizer for F
where
    F: FnMut(&ColorBuffer) -> Result<Vec<Detection>, RecognizerError> + Send,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn recognize(&mut self, image: &ColorBuffer) -> Result<Vec<Detection>, RecognizerError> {
        self(image)
    }
}
