// SPDX-License-Identifier: GPL-3.0-only

//! One scanning session: analyzer, stabilizer and tick scheduler together
//!
//! Starting a session spawns the recognition worker and the tick thread;
//! stopping it joins both and clears the stabilizer, so toggling scanning
//! off and on always begins from an empty window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use tracing::{debug, info};

use crate::app::frame_processor::{
    AnalysisEvent, Detection, FrameAnalyzer, FramePipeline, Point, QrRecognizer, Recognizer,
};
use crate::app::stabilizer::{
    Clock, DetectionStabilizer, MonotonicClock, StabilizerScheduler, TickOutcome,
};
use crate::backends::camera::{Frame, OfferOutcome};
use crate::config::ScannerConfig;
use crate::constants::TICK_EVENT_BUFFER;
use crate::errors::{AppError, AppResult};

/// Builds a fresh recognizer each time scanning starts
pub type RecognizerFactory = Box<dyn Fn() -> Box<dyn Recognizer> + Send + Sync>;

/// Everything a session reports to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Analysis(AnalysisEvent),
    Tick(TickOutcome),
}

/// What the presentation layer draws
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSnapshot {
    pub scanning: bool,
    /// Result of the most recent tick
    pub stable: Option<String>,
    /// Last raw detection that passed the region filter
    pub latest: Option<Detection>,
    /// Geometry of `latest` in display coordinates
    pub overlay: Vec<Point>,
}

#[derive(Debug, Default)]
struct Presentation {
    latest: Option<Detection>,
    overlay: Vec<Point>,
}

impl Presentation {
    fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Analysis(AnalysisEvent::Detected(analyzed)) => {
                self.latest = analyzed.detections.last().cloned();
                self.overlay = analyzed.overlays.last().cloned().unwrap_or_default();
            }
            SessionEvent::Analysis(AnalysisEvent::Nothing { .. }) => self.clear(),
            _ => {}
        }
    }

    fn clear(&mut self) {
        self.latest = None;
        self.overlay.clear();
    }
}

pub struct ScanSession {
    config: ScannerConfig,
    clock: Arc<dyn Clock>,
    stabilizer: Arc<DetectionStabilizer>,
    scheduler: StabilizerScheduler,
    analyzer: Option<FrameAnalyzer>,
    recognizers: RecognizerFactory,
    /// Replaced on every stop, so streams of earlier runs cannot write into it
    presentation: Arc<Mutex<Presentation>>,
    events: Option<BoxStream<'static, SessionEvent>>,
}

impl ScanSession {
    /// Session using the built-in QR recognizer
    pub fn with_qr(config: ScannerConfig) -> AppResult<Self> {
        let max_dimension = config.max_recognizer_dimension;
        Self::new(
            config,
            Box::new(move || -> Box<dyn Recognizer> {
                Box::new(QrRecognizer::with_max_dimension(max_dimension))
            }),
        )
    }

    pub fn new(config: ScannerConfig, recognizers: RecognizerFactory) -> AppResult<Self> {
        Self::with_clock(config, recognizers, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: ScannerConfig,
        recognizers: RecognizerFactory,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        config.validate()?;
        let stabilizer = Arc::new(DetectionStabilizer::with_settings(
            config.stabilizer_settings(),
        ));
        let scheduler = StabilizerScheduler::new(Arc::clone(&stabilizer), Arc::clone(&clock));
        Ok(Self {
            config,
            clock,
            stabilizer,
            scheduler,
            analyzer: None,
            recognizers,
            presentation: Arc::new(Mutex::new(Presentation::default())),
            events: None,
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn stabilizer(&self) -> &Arc<DetectionStabilizer> {
        &self.stabilizer
    }

    pub fn is_scanning(&self) -> bool {
        self.analyzer.is_some()
    }

    fn presentation(&self) -> MutexGuard<'_, Presentation> {
        self.presentation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start scanning, restarting from scratch if already running
    pub fn start(&mut self) -> AppResult<()> {
        self.stop();

        let pipeline = FramePipeline::new((self.recognizers)(), self.config.analyzer_settings());
        let (analyzer, analysis_events) = FrameAnalyzer::spawn(
            pipeline,
            Arc::clone(&self.stabilizer),
            Arc::clone(&self.clock),
        )
        .map_err(|e| AppError::Other(format!("failed to start frame analyzer: {e}")))?;

        let (mut tick_tx, tick_events) = mpsc::channel(TICK_EVENT_BUFFER);
        let started = self
            .scheduler
            .start_with(self.config.tick_period(), move |outcome| {
                // Lagging consumers miss ticks; the stabilizer state is unaffected
                let _ = tick_tx.try_send(outcome);
            });
        if let Err(e) = started {
            let mut analyzer = analyzer;
            analyzer.stop();
            return Err(AppError::Other(format!("failed to start stabilizer ticks: {e}")));
        }

        let presentation = Arc::clone(&self.presentation);
        self.events = Some(
            stream::select(
                analysis_events.map(SessionEvent::Analysis),
                tick_events.map(SessionEvent::Tick),
            )
            .inspect(move |event| {
                presentation
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(event);
            })
            .boxed(),
        );
        self.analyzer = Some(analyzer);

        info!(
            window_ms = self.config.window_ms,
            tick_period_ms = self.config.tick_period_ms,
            self_refresh = self.config.self_refresh,
            "Scanning started"
        );
        Ok(())
    }

    /// Stop scanning and clear all detection state
    ///
    /// Returns once the worker and tick threads have exited. Safe to call
    /// when not scanning.
    pub fn stop(&mut self) {
        let was_scanning = match self.analyzer.take() {
            Some(mut analyzer) => {
                debug!(dropped_frames = analyzer.dropped_frames(), "Stopping frame analyzer");
                analyzer.stop();
                true
            }
            None => false,
        };
        self.scheduler.stop();
        self.events = None;
        self.stabilizer.reset();
        self.presentation = Arc::new(Mutex::new(Presentation::default()));
        if was_scanning {
            info!("Scanning stopped");
        }
    }

    /// Flip scanning on or off; returns whether scanning is now active
    pub fn toggle(&mut self) -> AppResult<bool> {
        if self.is_scanning() {
            self.stop();
        } else {
            self.start()?;
        }
        Ok(self.is_scanning())
    }

    /// Offer a camera frame; discarded when not scanning
    pub fn submit_frame(&self, frame: Frame) -> OfferOutcome {
        match &self.analyzer {
            Some(analyzer) => analyzer.submit(frame),
            None => OfferOutcome::Closed,
        }
    }

    /// Take the event stream of the current scanning run
    ///
    /// The latest-detection part of [`ScanSnapshot`] follows the events as
    /// they are consumed, so whoever takes the stream should keep draining it.
    pub fn take_events(&mut self) -> Option<BoxStream<'static, SessionEvent>> {
        self.events.take()
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        let presentation = self.presentation();
        ScanSnapshot {
            scanning: self.is_scanning(),
            stable: self.stabilizer.stable_value(),
            latest: presentation.latest.clone(),
            overlay: presentation.overlay.clone(),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
    }
}
