// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis
//!
//! Turns camera frames into region-filtered detections: color conversion,
//! recognition through a pluggable [`Recognizer`], region-of-interest
//! gating and mapping to preview coordinates.

pub mod analyzer;
pub mod region_filter;
pub mod tasks;
pub mod types;

pub use analyzer::{AnalysisEvent, AnalyzedFrame, AnalyzerSettings, FrameAnalyzer, FramePipeline};
pub use region_filter::{FitMode, PreviewTransform, RegionFilter, RegionOfInterest, accepts, rescale};
pub use tasks::{QrRecognizer, Recognizer};
pub use types::{BarcodeFormat, BoundingBox, Detection, Geometry, Point};
