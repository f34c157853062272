// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for scanning sessions, driven by a scripted recognizer

use futures::StreamExt;
use futures::stream::BoxStream;
use scanner::app::frame_processor::{
    AnalysisEvent, BarcodeFormat, BoundingBox, Detection, Geometry, Recognizer,
};
use scanner::backends::camera::types::Frame;
use scanner::backends::camera::{OfferOutcome, Resolution};
use scanner::constants::ScanFrequency;
use scanner::errors::RecognizerError;
use scanner::media::{ChromaLayout, ColorBuffer, frame_from_rgba};
use scanner::{ScanSession, ScannerConfig, SessionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Reports one fixed value while enabled
struct ScriptedRecognizer {
    value: &'static str,
    geometry: Option<BoundingBox>,
    enabled: Arc<AtomicBool>,
    delay: Duration,
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&mut self, _image: &ColorBuffer) -> Result<Vec<Detection>, RecognizerError> {
        std::thread::sleep(self.delay);
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let mut detection = Detection::new(self.value, BarcodeFormat::QrCode);
        if let Some(rect) = self.geometry {
            detection = detection.with_geometry(Geometry::Rect(rect));
        }
        Ok(vec![detection])
    }
}

fn fast_config() -> ScannerConfig {
    ScannerConfig {
        window_ms: 200,
        tick_period_ms: 20,
        scan_frequency: ScanFrequency::Unlimited,
        ..Default::default()
    }
}

fn session_with(
    config: ScannerConfig,
    geometry: Option<BoundingBox>,
    delay: Duration,
) -> (ScanSession, Arc<AtomicBool>) {
    let enabled = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&enabled);
    let session = ScanSession::new(
        config,
        Box::new(move || -> Box<dyn Recognizer> {
            Box::new(ScriptedRecognizer {
                value: "hello",
                geometry,
                enabled: Arc::clone(&flag),
                delay,
            })
        }),
    )
    .unwrap();
    (session, enabled)
}

fn gray_frame() -> Frame {
    let rgba = [128u8, 128, 128, 255].repeat(64 * 48);
    frame_from_rgba(64, 48, &rgba, ChromaLayout::Nv21, 0).unwrap()
}

fn fresh(frame: &Frame) -> Frame {
    let mut frame = frame.clone();
    frame.captured_at = Instant::now();
    frame
}

/// Keep submitting frames until `done` accepts an event
async fn drive_until<F>(
    session: &ScanSession,
    events: &mut BoxStream<'static, SessionEvent>,
    mut done: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent, &ScanSession) -> bool,
{
    let frame = gray_frame();
    tokio::time::timeout(TIMEOUT, async {
        loop {
            session.submit_frame(fresh(&frame));
            tokio::select! {
                event = events.next() => {
                    let event = event.expect("event stream ended");
                    if done(&event, session) {
                        return event;
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

#[tokio::test]
async fn test_session_reaches_stable_value() {
    let (mut session, _) = session_with(
        ScannerConfig {
            display: Some(Resolution::new(128, 96)),
            ..fast_config()
        },
        Some(BoundingBox::new(10.0, 10.0, 30.0, 30.0)),
        Duration::ZERO,
    );
    session.start().unwrap();
    let mut events = session.take_events().unwrap();

    drive_until(&session, &mut events, |event, session| {
        matches!(event, SessionEvent::Tick(t) if t.stable.as_deref() == Some("hello"))
            && session.snapshot().latest.is_some()
    })
    .await;

    let snapshot = session.snapshot();
    assert!(snapshot.scanning);
    assert_eq!(snapshot.stable.as_deref(), Some("hello"));
    assert_eq!(snapshot.latest.unwrap().value, "hello");
    // Display is exactly twice the analysis resolution
    assert_eq!(snapshot.overlay.len(), 4);
    assert!((snapshot.overlay[0].x - 20.0).abs() < 1e-3);
    assert!((snapshot.overlay[2].y - 60.0).abs() < 1e-3);

    session.stop();
}

#[tokio::test]
async fn test_region_rejection_keeps_stabilizer_empty() {
    let (mut session, _) = session_with(
        ScannerConfig {
            region: Some(BoundingBox::new(0.0, 0.0, 20.0, 20.0)),
            strict_region: true,
            ..fast_config()
        },
        Some(BoundingBox::new(30.0, 30.0, 40.0, 40.0)),
        Duration::ZERO,
    );
    session.start().unwrap();
    let mut events = session.take_events().unwrap();

    drive_until(&session, &mut events, |event, _| {
        matches!(
            event,
            SessionEvent::Analysis(AnalysisEvent::Nothing { rejected: 1 })
        )
    })
    .await;

    assert!(session.stabilizer().is_empty());
    assert_eq!(session.snapshot().latest, None);
    session.stop();
}

#[tokio::test]
async fn test_empty_frame_clears_latest_but_not_stable() {
    let (mut session, enabled) = session_with(fast_config(), None, Duration::ZERO);
    session.start().unwrap();
    let mut events = session.take_events().unwrap();

    drive_until(&session, &mut events, |event, session| {
        matches!(event, SessionEvent::Tick(t) if t.stable.is_some())
            && session.snapshot().latest.is_some()
    })
    .await;

    enabled.store(false, Ordering::SeqCst);
    drive_until(&session, &mut events, |event, _| {
        matches!(event, SessionEvent::Analysis(AnalysisEvent::Nothing { .. }))
    })
    .await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.latest, None);
    assert!(snapshot.overlay.is_empty());
    // The winner keeps refreshing itself
    assert_eq!(snapshot.stable.as_deref(), Some("hello"));
    session.stop();
}

#[tokio::test]
async fn test_stop_resets_and_rejects_frames() {
    let (mut session, _) = session_with(fast_config(), None, Duration::ZERO);
    session.start().unwrap();
    let mut events = session.take_events().unwrap();

    drive_until(&session, &mut events, |event, _| {
        matches!(event, SessionEvent::Tick(t) if t.stable.is_some())
    })
    .await;

    session.stop();
    session.stop();
    let snapshot = session.snapshot();
    assert!(!snapshot.scanning);
    assert_eq!(snapshot.stable, None);
    assert!(session.stabilizer().is_empty());
    assert_eq!(session.submit_frame(gray_frame()), OfferOutcome::Closed);

    // The old stream ends once its producers are gone
    let rest = tokio::time::timeout(TIMEOUT, events.collect::<Vec<_>>()).await;
    assert!(rest.is_ok());
}

#[tokio::test]
async fn test_draining_old_stream_after_stop_keeps_state_cleared() {
    let (mut session, _) = session_with(
        fast_config(),
        Some(BoundingBox::new(10.0, 10.0, 30.0, 30.0)),
        Duration::ZERO,
    );
    session.start().unwrap();
    let events = session.take_events().unwrap();

    // Let detections pile up in the stream without consuming it
    let frame = gray_frame();
    let deadline = Instant::now() + TIMEOUT;
    while session.stabilizer().is_empty() {
        assert!(Instant::now() < deadline, "no detection reached the stabilizer");
        session.submit_frame(fresh(&frame));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    session.stop();
    let old = tokio::time::timeout(TIMEOUT, events.collect::<Vec<_>>())
        .await
        .expect("old stream did not end");
    assert!(
        old.iter()
            .any(|e| matches!(e, SessionEvent::Analysis(AnalysisEvent::Detected(_))))
    );

    let snapshot = session.snapshot();
    assert!(!snapshot.scanning);
    assert_eq!(snapshot.stable, None);
    assert_eq!(snapshot.latest, None);
    assert!(snapshot.overlay.is_empty());

    // A new run starts from a clean presentation too
    session.start().unwrap();
    assert_eq!(session.snapshot().latest, None);
    session.stop();
}

#[tokio::test]
async fn test_slow_recognizer_only_sees_latest_frame() {
    let (mut session, _) = session_with(fast_config(), None, Duration::from_millis(100));
    session.start().unwrap();

    let frame = gray_frame();
    let outcomes: Vec<OfferOutcome> = (0..20)
        .map(|_| {
            let outcome = session.submit_frame(fresh(&frame));
            std::thread::sleep(Duration::from_millis(2));
            outcome
        })
        .collect();

    assert!(outcomes.contains(&OfferOutcome::Replaced));
    assert!(!outcomes.contains(&OfferOutcome::Closed));
    session.stop();
}

#[tokio::test]
async fn test_scan_frequency_throttles_analysis() {
    let (mut session, _) = session_with(
        ScannerConfig {
            scan_frequency: ScanFrequency::Slow,
            ..fast_config()
        },
        None,
        Duration::ZERO,
    );
    session.start().unwrap();
    let mut events = session.take_events().unwrap();

    let frame = gray_frame();
    let mut analyzed = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(400);
    loop {
        session.submit_frame(fresh(&frame));
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            event = events.next() => {
                if let Some(SessionEvent::Analysis(_)) = event {
                    analyzed += 1;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }

    assert_eq!(analyzed, 1);
    session.stop();
}
