// SPDX-License-Identifier: GPL-3.0-only

//! Scanning logic
//!
//! # Architecture
//!
//! - `frame_processor`: frame conversion, recognition and region filtering
//! - `stabilizer`: time-windowed majority vote and its tick scheduler
//! - `session`: one scanning session wiring the two together

pub mod frame_processor;
pub mod session;
pub mod stabilizer;

pub use session::{RecognizerFactory, ScanSession, ScanSnapshot, SessionEvent};
