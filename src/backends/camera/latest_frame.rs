// SPDX-License-Identifier: GPL-3.0-only

//! Keep-only-latest frame hand-off
//!
//! The camera source offers frames at its own cadence; the recognition
//! worker takes them one at a time. A frame offered while another is
//! still waiting replaces it, so the worker never falls behind the camera.

use crate::backends::camera::types::Frame;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct SlotState {
    pending: Option<Frame>,
    closed: bool,
    dropped: u64,
}

/// Single-slot mailbox between the camera source and the recognition worker
#[derive(Default)]
pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

/// Result of offering a frame to the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// The slot was empty
    Stored,
    /// An older, not yet taken frame was discarded
    Replaced,
    /// The slot is closed; the frame was discarded
    Closed,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a frame, replacing any frame still waiting
    pub fn offer(&self, frame: Frame) -> OfferOutcome {
        let mut state = self.lock();
        if state.closed {
            return OfferOutcome::Closed;
        }
        let outcome = match state.pending.replace(frame) {
            Some(_) => {
                state.dropped += 1;
                OfferOutcome::Replaced
            }
            None => OfferOutcome::Stored,
        };
        drop(state);
        self.ready.notify_one();
        outcome
    }

    /// Take the waiting frame, blocking up to `timeout` for one to arrive
    pub fn take_timeout(&self, timeout: Duration) -> Option<Frame> {
        let state = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| s.pending.is_none() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        state.pending.take()
    }

    /// Reject further frames and wake any waiting taker
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.pending = None;
        drop(state);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of frames discarded because a newer one replaced them
    pub fn dropped_frames(&self) -> u64 {
        self.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{Plane, SensorRotation};
    use std::sync::Arc;
    use std::time::Instant;

    fn frame(width: u32) -> Frame {
        let w = width as usize;
        Frame {
            width,
            height: 2,
            rotation: SensorRotation::None,
            y: Plane::packed(vec![0u8; w * 2], w),
            u: Plane::packed(vec![128u8; w.div_ceil(2)], w.div_ceil(2)),
            v: Plane::packed(vec![128u8; w.div_ceil(2)], w.div_ceil(2)),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_newer_frame_replaces_pending() {
        let slot = LatestFrameSlot::new();
        assert_eq!(slot.offer(frame(2)), OfferOutcome::Stored);
        assert_eq!(slot.offer(frame(4)), OfferOutcome::Replaced);
        assert_eq!(slot.dropped_frames(), 1);

        let taken = slot.take_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(taken.width, 4);
        assert!(slot.take_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_take_wakes_on_offer() {
        let slot = Arc::new(LatestFrameSlot::new());
        let producer = Arc::clone(&slot);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.offer(frame(6));
        });

        let taken = slot.take_timeout(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(taken.map(|f| f.width), Some(6));
    }

    #[test]
    fn test_closed_slot_rejects_frames() {
        let slot = LatestFrameSlot::new();
        slot.offer(frame(2));
        slot.close();
        assert!(slot.is_closed());
        assert_eq!(slot.offer(frame(2)), OfferOutcome::Closed);
        assert!(slot.take_timeout(Duration::from_millis(10)).is_none());
    }
}
