// SPDX-License-Identifier: GPL-3.0-only

//! Camera frame plumbing
//!
//! The camera itself is external. This module holds what the core needs to
//! receive its frames: the frame types, the keep-only-latest hand-off to the
//! recognition worker, and the worker thread controller.

pub mod frame_loop;
pub mod latest_frame;
pub mod types;

pub use frame_loop::{FrameLoopController, LoopAction};
pub use latest_frame::{LatestFrameSlot, OfferOutcome};
pub use types::*;
