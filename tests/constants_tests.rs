// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use scanner::constants::{DEFAULT_TICK_PERIOD, DEFAULT_WINDOW, ScanFrequency, ScanResolution};
use std::time::Duration;

#[test]
fn test_default_timing() {
    assert_eq!(DEFAULT_WINDOW, Duration::from_millis(1000));
    assert_eq!(DEFAULT_TICK_PERIOD, Duration::from_millis(1000));
}

#[test]
fn test_scan_frequency_ordering() {
    // Frequencies are ordered from fastest to slowest
    let mut prev = Duration::ZERO;
    for frequency in ScanFrequency::ALL {
        let delay = frequency.delay();
        assert!(delay >= prev, "{:?} should not be faster than the previous", frequency);
        prev = delay;
    }
    assert_eq!(ScanFrequency::Unlimited.delay(), Duration::ZERO);
    assert_eq!(ScanFrequency::default(), ScanFrequency::Normal);
}

#[test]
fn test_scan_frequency_display_names() {
    for frequency in ScanFrequency::ALL {
        assert!(
            !frequency.display_name().is_empty(),
            "Frequency {:?} has empty display name",
            frequency
        );
    }
}

#[test]
fn test_scan_resolution_landscape() {
    for resolution in ScanResolution::ALL {
        let (width, height) = resolution.dimensions();
        assert!(width > height, "{:?} should be landscape", resolution);
    }
}
