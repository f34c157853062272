// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use scanner::app::frame_processor::{BoundingBox, FitMode};
use scanner::backends::camera::Resolution;
use scanner::constants::ScanFrequency;
use scanner::{AppError, ScannerConfig};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = ScannerConfig::default();

    assert_eq!(config.window(), Duration::from_millis(1000));
    assert_eq!(config.tick_period(), Duration::from_millis(1000));
    assert!(config.self_refresh, "Self-refresh should be enabled by default");
    assert!(!config.strict_region, "Loose region matching by default");
    assert_eq!(config.region, None);
    assert_eq!(config.fit_mode, FitMode::Fill);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = ScannerConfig {
        window_ms: 1500,
        region: Some(BoundingBox::new(10.0, 20.0, 300.0, 400.0)),
        strict_region: true,
        display: Some(Resolution::new(1080, 1920)),
        scan_frequency: ScanFrequency::Fast,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = ScannerConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_load_rejects_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"tick_period_ms": 0}"#).unwrap();
    assert!(matches!(ScannerConfig::load(&path), Err(AppError::Config(_))));

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(ScannerConfig::load(&path), Err(AppError::Config(_))));
}

#[test]
fn test_config_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = ScannerConfig::load(&dir.path().join("missing.json"));
    assert!(matches!(result, Err(AppError::Storage(_))));
}

#[test]
fn test_config_default_path() {
    if let Some(path) = ScannerConfig::default_path() {
        assert!(path.ends_with("scanner/config.json"));
    }
}
