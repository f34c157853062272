// SPDX-License-Identifier: GPL-3.0-only

//! Frame source abstraction
//!
//! ```text
//! ┌──────────────────────┐
//! │  Camera (external)   │
//! └──────────┬───────────┘
//!            │ Frame
//!            ▼
//! ┌──────────────────────┐
//! │   LatestFrameSlot    │  ← keep-only-latest backpressure
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ Recognition worker   │  ← FrameLoopController thread
//! └──────────────────────┘
//! ```

pub mod camera;
