// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Stored as JSON under the user configuration directory. Missing fields
//! take their defaults, so older files keep loading as fields are added.

use crate::app::frame_processor::{AnalyzerSettings, BoundingBox, FitMode, RegionOfInterest};
use crate::app::stabilizer::StabilizerSettings;
use crate::backends::camera::Resolution;
use crate::constants::{
    DEFAULT_MAX_RECOGNIZER_DIMENSION, DEFAULT_TICK_PERIOD, DEFAULT_WINDOW, ScanFrequency,
    ScanResolution,
};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR_NAME: &str = "scanner";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Trailing window over which raw detections vote (milliseconds)
    pub window_ms: u64,
    /// Period between stabilizer ticks (milliseconds)
    pub tick_period_ms: u64,
    /// Re-insert the winning value on every tick
    pub self_refresh: bool,
    /// Region of interest in display coordinates
    pub region: Option<BoundingBox>,
    /// Require detections to lie fully inside the region
    pub strict_region: bool,
    /// How the analysis image is fitted into the preview
    pub fit_mode: FitMode,
    /// Preview surface size; without it the region is in analysis coordinates
    pub display: Option<Resolution>,
    /// Minimum spacing between analyzed frames
    pub scan_frequency: ScanFrequency,
    /// Analysis resolution still images are scaled to
    pub scan_resolution: ScanResolution,
    /// Only hand the region to the recognizer
    pub crop_to_region: bool,
    /// Images larger than this are downscaled before QR detection
    pub max_recognizer_dimension: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW.as_millis() as u64,
            tick_period_ms: DEFAULT_TICK_PERIOD.as_millis() as u64,
            self_refresh: true,
            region: None,
            strict_region: false,
            fit_mode: FitMode::default(),
            display: None,
            scan_frequency: ScanFrequency::default(),
            scan_resolution: ScanResolution::default(),
            crop_to_region: false,
            max_recognizer_dimension: DEFAULT_MAX_RECOGNIZER_DIMENSION,
        }
    }
}

impl ScannerConfig {
    /// `<config dir>/scanner/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ScannerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            debug!("No configuration directory; using defaults");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid configuration; using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.window_ms == 0 {
            return Err(AppError::Config("window_ms must be greater than zero".into()));
        }
        if self.tick_period_ms == 0 {
            return Err(AppError::Config(
                "tick_period_ms must be greater than zero".into(),
            ));
        }
        if self.max_recognizer_dimension == 0 {
            return Err(AppError::Config(
                "max_recognizer_dimension must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn region_of_interest(&self) -> Option<RegionOfInterest> {
        self.region
            .map(|rect| RegionOfInterest::new(rect, self.strict_region))
    }

    pub fn stabilizer_settings(&self) -> StabilizerSettings {
        StabilizerSettings {
            window: self.window(),
            self_refresh: self.self_refresh,
        }
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            region: self.region_of_interest(),
            display: self.display,
            fit_mode: self.fit_mode,
            scan_frequency: self.scan_frequency,
            crop_to_region: self.crop_to_region,
        }
    }
}
