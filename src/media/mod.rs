// SPDX-License-Identifier: GPL-3.0-only

//! Frame color conversion
//!
//! Camera frames arrive as planar YUV 4:2:0, which recognizers cannot use
//! directly. The [`yuv_converter`] module turns them into packed RGBA using
//! buffers that live as long as the converter. The [`planar`] module goes
//! the other way, building frames from RGBA images or raw I420 dumps.

pub mod planar;
pub mod yuv_converter;

pub use planar::{ChromaLayout, frame_from_i420, frame_from_rgba};
pub use yuv_converter::{ColorBuffer, FrameColorConverter};
