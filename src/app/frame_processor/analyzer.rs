// SPDX-License-Identifier: GPL-3.0-only

//! Recognition worker
//!
//! ```text
//! camera ──offer──▶ LatestFrameSlot ──take──▶ [frame-analyzer thread]
//!                                                │ convert (FrameColorConverter)
//!                                                │ crop to region (optional)
//!                                                │ recognize (Recognizer)
//!                                                │ region filter
//!                                                ├──insert──▶ DetectionStabilizer
//!                                                └──event───▶ AnalysisEvent channel
//! ```
//!
//! [`FramePipeline`] is the synchronous per-frame part; [`FrameAnalyzer`]
//! runs it on a dedicated thread behind keep-only-latest backpressure.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::channel::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::app::frame_processor::region_filter::{
    FitMode, PreviewTransform, RegionFilter, RegionOfInterest,
};
use crate::app::frame_processor::tasks::Recognizer;
use crate::app::frame_processor::types::{BoundingBox, Detection, Point};
use crate::app::stabilizer::{Clock, DetectionStabilizer};
use crate::backends::camera::{
    Frame, FrameLoopController, LatestFrameSlot, LoopAction, OfferOutcome, Resolution,
};
use crate::constants::{ANALYSIS_EVENT_BUFFER, ScanFrequency, WORKER_POLL_INTERVAL};
use crate::errors::{FrameError, RecognizerError};
use crate::media::FrameColorConverter;

/// Per-session analysis configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalyzerSettings {
    /// Region detections must fall in, in display coordinates
    pub region: Option<RegionOfInterest>,
    /// Preview surface size; without it the region is taken as analysis coordinates
    pub display: Option<Resolution>,
    pub fit_mode: FitMode,
    pub scan_frequency: ScanFrequency,
    /// Hand the recognizer only the part of the image under the region
    pub crop_to_region: bool,
}

/// Detections from one analyzed frame that passed the region filter
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedFrame {
    /// Upright analysis resolution
    pub resolution: Resolution,
    pub detections: Vec<Detection>,
    /// Geometry of each detection in display coordinates (empty if none was reported)
    pub overlays: Vec<Vec<Point>>,
    /// Detections dropped by the region filter
    pub rejected: usize,
}

/// Outcome of analyzing one frame
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Detected(AnalyzedFrame),
    /// The frame produced no accepted detection
    Nothing { rejected: usize },
    /// Malformed frame, skipped
    FrameSkipped(FrameError),
    /// Recognizer failed on this frame
    RecognizerFailed(RecognizerError),
}

#[derive(Debug, Clone, Copy)]
struct ViewGeometry {
    resolution: Resolution,
    transform: PreviewTransform,
    filter: RegionFilter,
}

impl ViewGeometry {
    fn new(resolution: Resolution, settings: &AnalyzerSettings) -> Self {
        let transform = match settings.display {
            Some(display) => PreviewTransform::new(resolution, display, settings.fit_mode),
            None => PreviewTransform::identity(),
        };
        let filter = match settings.region {
            Some(roi) => RegionFilter::new(roi, &transform),
            None => RegionFilter::unrestricted(),
        };
        debug!(%resolution, scale = transform.scale(), "Analysis geometry updated");
        Self {
            resolution,
            transform,
            filter,
        }
    }
}

/// Convert, recognize and filter one frame at a time
pub struct FramePipeline {
    converter: FrameColorConverter,
    recognizer: Box<dyn Recognizer>,
    settings: AnalyzerSettings,
    /// Rebuilt whenever the analysis resolution changes
    view: Option<ViewGeometry>,
}

impl FramePipeline {
    pub fn new(recognizer: Box<dyn Recognizer>, settings: AnalyzerSettings) -> Self {
        Self {
            converter: FrameColorConverter::new(),
            recognizer,
            settings,
            view: None,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze one frame; detections are stamped with `now_ms`
    pub fn analyze(&mut self, frame: &Frame, now_ms: u64) -> AnalysisEvent {
        let image = match self.converter.convert(frame) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, width = frame.width, height = frame.height, "Skipping malformed frame");
                return AnalysisEvent::FrameSkipped(e);
            }
        };

        let resolution = image.resolution();
        let view = match self.view {
            Some(view) if view.resolution == resolution => view,
            _ => *self.view.insert(ViewGeometry::new(resolution, &self.settings)),
        };
        if view.filter.rejects_everything() {
            return AnalysisEvent::Nothing { rejected: 0 };
        }

        let cropped = match (self.settings.crop_to_region, view.filter.region()) {
            (true, Some(region)) => match pixel_rect(&region, resolution) {
                Some(rect) => Some(rect),
                None => return AnalysisEvent::Nothing { rejected: 0 },
            },
            _ => None,
        };

        let result = match cropped {
            Some((x, y, width, height)) => match image.crop(x, y, width, height) {
                Ok(part) => self
                    .recognizer
                    .recognize(&part)
                    .map(|found| translate_all(found, x as f32, y as f32)),
                Err(e) => return AnalysisEvent::FrameSkipped(e),
            },
            None => self.recognizer.recognize(image),
        };

        let found = match result {
            Ok(found) => found,
            Err(e) => {
                debug!(recognizer = self.recognizer.name(), error = %e, "Recognizer failed");
                return AnalysisEvent::RecognizerFailed(e);
            }
        };

        let total = found.len();
        let detections: Vec<Detection> = found
            .into_iter()
            .map(|d| d.at(now_ms))
            .filter(|d| view.filter.accepts(d.geometry.as_ref()))
            .collect();
        let rejected = total - detections.len();
        if rejected > 0 {
            trace!(rejected, "Detections outside region of interest");
        }
        if detections.is_empty() {
            return AnalysisEvent::Nothing { rejected };
        }

        let overlays = detections
            .iter()
            .map(|d| {
                d.geometry
                    .as_ref()
                    .map(|g| view.transform.geometry_to_display(g))
                    .unwrap_or_default()
            })
            .collect();

        AnalysisEvent::Detected(AnalyzedFrame {
            resolution,
            detections,
            overlays,
            rejected,
        })
    }
}

fn translate_all(found: Vec<Detection>, dx: f32, dy: f32) -> Vec<Detection> {
    found
        .into_iter()
        .map(|mut d| {
            d.geometry = d.geometry.map(|g| g.translated(dx, dy));
            d
        })
        .collect()
}

/// Whole-pixel rectangle covering `region`, clipped to the image
fn pixel_rect(region: &BoundingBox, image: Resolution) -> Option<(u32, u32, u32, u32)> {
    let left = region.left.max(0.0).floor();
    let top = region.top.max(0.0).floor();
    let right = region.right.min(image.width as f32).ceil();
    let bottom = region.bottom.min(image.height as f32).ceil();
    if right <= left || bottom <= top {
        return None;
    }
    Some((
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

/// Background recognition worker
///
/// Frames are offered with [`FrameAnalyzer::submit`]; a frame that arrives
/// while another is still waiting replaces it. Accepted detections go to
/// the stabilizer, and every analyzed frame yields an [`AnalysisEvent`].
pub struct FrameAnalyzer {
    slot: Arc<LatestFrameSlot>,
    controller: FrameLoopController,
}

impl FrameAnalyzer {
    pub fn spawn(
        pipeline: FramePipeline,
        stabilizer: Arc<DetectionStabilizer>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<(Self, Receiver<AnalysisEvent>)> {
        let (events, receiver) = mpsc::channel(ANALYSIS_EVENT_BUFFER);
        let slot = Arc::new(LatestFrameSlot::new());
        let worker = AnalyzerWorker {
            slot: Arc::clone(&slot),
            scan_delay: pipeline.settings().scan_frequency.delay(),
            pipeline,
            stabilizer,
            clock,
            events,
            last_analyzed: None,
        };

        let controller = FrameLoopController::start_with_init(
            "frame-analyzer",
            move || Ok(worker),
            AnalyzerWorker::step,
        )?;

        Ok((Self { slot, controller }, receiver))
    }

    /// Hand a frame to the worker
    pub fn submit(&self, frame: Frame) -> OfferOutcome {
        self.slot.offer(frame)
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Frames replaced before the worker got to them
    pub fn dropped_frames(&self) -> u64 {
        self.slot.dropped_frames()
    }

    /// Stop accepting frames and wait for the frame in progress to finish
    pub fn stop(&mut self) {
        self.slot.close();
        self.controller.stop();
    }
}

impl Drop for FrameAnalyzer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct AnalyzerWorker {
    slot: Arc<LatestFrameSlot>,
    pipeline: FramePipeline,
    stabilizer: Arc<DetectionStabilizer>,
    clock: Arc<dyn Clock>,
    events: Sender<AnalysisEvent>,
    scan_delay: Duration,
    last_analyzed: Option<Instant>,
}

impl AnalyzerWorker {
    fn step(&mut self) -> LoopAction {
        let Some(frame) = self.slot.take_timeout(WORKER_POLL_INTERVAL) else {
            return if self.slot.is_closed() {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            };
        };

        if let Some(last) = self.last_analyzed {
            let since = frame.captured_at.saturating_duration_since(last);
            if since < self.scan_delay {
                trace!(since_ms = since.as_millis() as u64, "Frame throttled by scan frequency");
                return LoopAction::Continue;
            }
        }
        self.last_analyzed = Some(frame.captured_at);

        let now_ms = self.clock.now_ms();
        let event = self.pipeline.analyze(&frame, now_ms);
        if let AnalysisEvent::Detected(analyzed) = &event {
            for detection in &analyzed.detections {
                self.stabilizer
                    .insert(detection.value.clone(), detection.timestamp_ms);
            }
        }

        if let Err(e) = self.events.try_send(event) {
            if e.is_disconnected() {
                trace!("Analysis event receiver dropped");
            } else {
                trace!("Analysis event buffer full, dropping event");
            }
        }
        LoopAction::Continue
    }
}
