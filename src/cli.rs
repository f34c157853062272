// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Converting raw frame dumps to PNG
//! - Scanning still images through a full scanning session
//! - Replaying detection scripts against the stabilizer
//! - Showing the configuration

use chrono::Local;
use futures::StreamExt;
use image::imageops::FilterType;
use scanner::app::frame_processor::AnalysisEvent;
use scanner::app::stabilizer::{DetectionStabilizer, StabilizerSettings};
use scanner::backends::camera::types::{Frame, SensorRotation};
use scanner::constants::ScanResolution;
use scanner::media::{ChromaLayout, FrameColorConverter, frame_from_i420, frame_from_rgba};
use scanner::{ScanSession, ScannerConfig, SessionEvent};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Convert a raw I420 dump to a PNG image
pub fn convert_frame(
    input: PathBuf,
    width: u32,
    height: u32,
    rotation: i32,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if rotation.rem_euclid(90) != 0 {
        return Err(format!("Rotation must be a multiple of 90 degrees, got {}", rotation).into());
    }
    let rotation = SensorRotation::from_degrees_int(rotation);

    let data = std::fs::read(&input)?;
    let frame = frame_from_i420(width, height, &data, rotation)?;

    let mut converter = FrameColorConverter::new();
    let start = Instant::now();
    let rgba = converter.convert(&frame)?;
    let elapsed = start.elapsed();

    let image = rgba
        .to_rgba_image()
        .ok_or("Converted buffer does not match its dimensions")?;

    let output = output.unwrap_or_else(|| {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("frame_{}.png", timestamp))
    });
    image.save(&output)?;

    println!(
        "Converted {}x{} (rotation {}) to {}x{} in {:.1} ms",
        width,
        height,
        rotation,
        image.width(),
        image.height(),
        elapsed.as_secs_f64() * 1000.0
    );
    println!("Saved: {}", output.display());
    Ok(())
}

/// Feed still images through a scanning session and print stable values
pub fn scan_images(
    input: Vec<PathBuf>,
    fps: u32,
    frames_per_image: u32,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => ScannerConfig::load(&path)?,
        None => ScannerConfig::load_or_default(),
    };

    let image_paths = collect_image_paths(&input)?;
    if image_paths.is_empty() {
        return Err("No PNG or JPEG images found in input".into());
    }

    println!("Loading {} images...", image_paths.len());
    let frames = image_paths
        .iter()
        .map(|path| load_frame(path, config.scan_resolution))
        .collect::<Result<Vec<_>, _>>()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run_scan(config, frames, fps.max(1), frames_per_image.max(1)))
}

async fn run_scan(
    config: ScannerConfig,
    frames: Vec<Frame>,
    fps: u32,
    frames_per_image: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    // Long enough for the last detections to win a tick
    let linger = config.window() + config.tick_period() * 2;

    let mut session = ScanSession::with_qr(config)?;
    session.start()?;
    let mut events = session
        .take_events()
        .ok_or("Scanning session produced no event stream")?;

    let mut schedule = frames
        .iter()
        .flat_map(|frame| std::iter::repeat_n(frame, frames_per_image as usize));
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(frame) = schedule.next() else {
                    break;
                };
                let mut frame = frame.clone();
                frame.captured_at = Instant::now();
                session.submit_frame(frame);
            }
            event = events.next() => match event {
                Some(event) => report_event(&event, started),
                None => break,
            },
        }
    }

    let deadline = tokio::time::Instant::now() + linger;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            event = events.next() => match event {
                Some(event) => report_event(&event, started),
                None => break,
            },
        }
    }

    let snapshot = session.snapshot();
    println!();
    match snapshot.stable {
        Some(value) => println!("Final stable value: {}", value),
        None => println!("No stable value"),
    }
    session.stop();
    Ok(())
}

fn report_event(event: &SessionEvent, started: Instant) {
    match event {
        SessionEvent::Tick(tick) if tick.changed => {
            println!(
                "[{:>7.2}s] stable: {}",
                started.elapsed().as_secs_f64(),
                tick.stable.as_deref().unwrap_or("(none)")
            );
        }
        SessionEvent::Analysis(AnalysisEvent::FrameSkipped(e)) => {
            eprintln!("Skipped frame: {}", e);
        }
        SessionEvent::Analysis(AnalysisEvent::RecognizerFailed(e)) => {
            tracing::debug!(error = %e, "Recognizer failed on frame");
        }
        _ => {}
    }
}

/// One scripted raw detection
#[derive(Debug, Deserialize)]
struct ScriptEntry {
    value: String,
    /// Arrival time in milliseconds
    t: u64,
}

/// Replay scripted detections with virtual-time ticks
pub fn simulate(
    script: PathBuf,
    window_ms: u64,
    tick_ms: u64,
    self_refresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if window_ms == 0 || tick_ms == 0 {
        return Err("Window and tick period must be greater than zero".into());
    }

    let mut entries: Vec<ScriptEntry> = serde_json::from_str(&std::fs::read_to_string(&script)?)?;
    entries.sort_by_key(|e| e.t);

    let stabilizer = DetectionStabilizer::with_settings(StabilizerSettings {
        window: Duration::from_millis(window_ms),
        self_refresh,
    });

    let end = entries.last().map_or(0, |e| e.t) + window_ms + tick_ms;
    let mut pending = entries.into_iter().peekable();
    let mut now = tick_ms;

    println!("{:>8}  {:>5}  stable", "t (ms)", "held");
    while now <= end {
        while let Some(entry) = pending.next_if(|e| e.t <= now) {
            stabilizer.insert(entry.value, entry.t);
        }
        let stable = stabilizer.tick(now);
        println!(
            "{:>8}  {:>5}  {}",
            now,
            stabilizer.len(),
            stable.as_deref().unwrap_or("-")
        );
        now += tick_ms;
    }
    Ok(())
}

/// Print the effective configuration, its path, or write the defaults
pub fn show_config(path_only: bool, init: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = ScannerConfig::default_path();

    if path_only {
        match &path {
            Some(path) => println!("{}", path.display()),
            None => println!("No configuration directory on this platform"),
        }
        return Ok(());
    }

    if init {
        let path = path.ok_or("No configuration directory on this platform")?;
        if path.exists() {
            return Err(format!("{} already exists", path.display()).into());
        }
        ScannerConfig::default().save(&path)?;
        println!("Wrote defaults to {}", path.display());
        return Ok(());
    }

    let config = ScannerConfig::load_or_default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Load an image file as an NV21 frame, downscaled to the scan resolution
fn load_frame(path: &Path, resolution: ScanResolution) -> Result<Frame, Box<dyn std::error::Error>> {
    let mut image = image::open(path)?;

    let (long, short) = resolution.dimensions();
    let (max_width, max_height) = if image.height() > image.width() {
        (short, long)
    } else {
        (long, short)
    };
    if image.width() > max_width || image.height() > max_height {
        image = image.resize(max_width, max_height, FilterType::Triangle);
    }

    let rgba = image.to_rgba8();
    let frame = frame_from_rgba(
        rgba.width(),
        rgba.height(),
        rgba.as_raw(),
        ChromaLayout::Nv21,
        0,
    )?;
    tracing::debug!(
        path = %path.display(),
        width = frame.width,
        height = frame.height,
        "Loaded image as frame"
    );
    Ok(frame)
}

/// Collect image paths from a list of files and directories
fn collect_image_paths(input: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                if is_supported_image(&file_path) {
                    paths.push(file_path);
                }
            }
        } else if is_supported_image(path) {
            paths.push(path.clone());
        }
    }

    // Sort by filename for consistent ordering
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths)
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "png" | "jpg" | "jpeg")
        })
        .unwrap_or(false)
}
