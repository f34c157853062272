// SPDX-License-Identifier: GPL-3.0-only

//! Detection stabilization
//!
//! Raw detections are noisy from frame to frame. The [`DetectionStabilizer`]
//! collects them over a sliding time window and the
//! [`StabilizerScheduler`] periodically turns that window into one stable
//! value.

pub mod clock;
pub mod scheduler;
pub mod window;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use scheduler::{StabilizerScheduler, TickOutcome};
pub use window::{DetectionStabilizer, StabilizerSettings};
