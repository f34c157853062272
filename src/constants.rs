// SPDX-License-Identifier: GPL-3.0-only

//! Scanner-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default trailing window over which raw detections vote
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

/// Default period between stabilizer ticks
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);

/// Bytes per pixel of the converter's packed output (RGBA)
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Frames larger than this are downscaled before QR detection
pub const DEFAULT_MAX_RECOGNIZER_DIMENSION: u32 = 640;

/// How long the recognition worker waits for a frame before re-checking its stop signal
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Analysis events buffered for a slow consumer before new ones are dropped
pub const ANALYSIS_EVENT_BUFFER: usize = 32;

/// Tick outcomes buffered for a slow consumer before new ones are dropped
pub const TICK_EVENT_BUFFER: usize = 8;

/// Minimum spacing between analyzed frames
///
/// Frames that arrive sooner than this after the previously analyzed frame
/// are skipped by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanFrequency {
    /// Analyze every frame the camera delivers
    Unlimited,
    /// 100 ms between frames
    Fast,
    /// 500 ms between frames (default)
    #[default]
    Normal,
    /// 1 s between frames
    Slow,
}

impl ScanFrequency {
    pub const ALL: [ScanFrequency; 4] = [
        ScanFrequency::Unlimited,
        ScanFrequency::Fast,
        ScanFrequency::Normal,
        ScanFrequency::Slow,
    ];

    /// Delay enforced between two analyzed frames
    pub fn delay(&self) -> Duration {
        match self {
            ScanFrequency::Unlimited => Duration::ZERO,
            ScanFrequency::Fast => Duration::from_millis(100),
            ScanFrequency::Normal => Duration::from_millis(500),
            ScanFrequency::Slow => Duration::from_millis(1000),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ScanFrequency::Unlimited => "Unlimited",
            ScanFrequency::Fast => "Fast",
            ScanFrequency::Normal => "Normal",
            ScanFrequency::Slow => "Slow",
        }
    }
}

/// Target analysis resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanResolution {
    /// 640x480
    #[default]
    Sd480,
    /// 1280x720
    Hd720,
    /// 1920x1080
    Fhd1080,
}

impl ScanResolution {
    pub const ALL: [ScanResolution; 3] = [
        ScanResolution::Sd480,
        ScanResolution::Hd720,
        ScanResolution::Fhd1080,
    ];

    /// (width, height) in landscape sensor orientation
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ScanResolution::Sd480 => (640, 480),
            ScanResolution::Hd720 => (1280, 720),
            ScanResolution::Fhd1080 => (1920, 1080),
        }
    }
}
