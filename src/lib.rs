// SPDX-License-Identifier: GPL-3.0-only

//! Scanner - turns noisy camera frames into one stable recognized value
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame types and the hand-off from the camera to the recognition worker
//! - [`media`]: YUV to RGBA conversion and frame synthesis
//! - [`app`]: Recognition, region filtering, stabilization and scanning sessions
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let mut session = ScanSession::with_qr(ScannerConfig::load_or_default())?;
//! session.start()?;
//! session.submit_frame(frame);
//! println!("{:?}", session.snapshot().stable);
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;

// Re-export commonly used types
pub use app::frame_processor::{Detection, QrRecognizer, Recognizer, RegionFilter};
pub use app::stabilizer::{DetectionStabilizer, StabilizerScheduler};
pub use app::{ScanSession, ScanSnapshot, SessionEvent};
pub use config::ScannerConfig;
pub use errors::{AppError, AppResult};
pub use media::FrameColorConverter;
