// SPDX-License-Identifier: GPL-3.0-only

//! Building planar YUV frames from RGBA images and raw files
//!
//! Used where no camera is attached: the CLI feeds still images through the
//! same conversion path a camera frame takes, and tests use it to produce
//! frames with realistic plane layouts.

use crate::backends::camera::types::{Frame, Plane, SensorRotation};
use crate::constants::RGBA_BYTES_PER_PIXEL;
use crate::errors::{FrameError, PlaneKind};
use std::sync::Arc;
use std::time::Instant;

/// How the chroma planes are laid out in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaLayout {
    /// Separate, tightly packed U and V planes
    #[default]
    I420,
    /// Interleaved V/U samples; both planes are views with pixel stride 2
    Nv21,
}

/// BT.601 limited-range RGB to YUV
#[inline]
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

/// Encode packed RGBA pixels as a 4:2:0 frame
///
/// Chroma is the average of each 2x2 block. `row_padding` extra bytes are
/// appended to every plane row to mimic hardware stride alignment.
pub fn frame_from_rgba(
    width: u32,
    height: u32,
    rgba: &[u8],
    layout: ChromaLayout,
    row_padding: usize,
) -> Result<Frame, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyFrame);
    }
    let (w, h) = (width as usize, height as usize);
    let required = w * h * RGBA_BYTES_PER_PIXEL;
    if rgba.len() < required {
        return Err(FrameError::PlaneTooShort {
            plane: PlaneKind::Luma,
            required,
            actual: rgba.len(),
        });
    }
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));

    let y_stride = w + row_padding;
    let mut luma = vec![0u8; y_stride * h];
    let mut u_samples = vec![0u8; cw * ch];
    let mut v_samples = vec![0u8; cw * ch];

    for cy in 0..ch {
        for cx in 0..cw {
            let (mut u_sum, mut v_sum, mut n) = (0u32, 0u32, 0u32);
            for y in (cy * 2)..(cy * 2 + 2).min(h) {
                for x in (cx * 2)..(cx * 2 + 2).min(w) {
                    let p = (y * w + x) * RGBA_BYTES_PER_PIXEL;
                    let (yy, u, v) = rgb_to_yuv(rgba[p], rgba[p + 1], rgba[p + 2]);
                    luma[y * y_stride + x] = yy;
                    u_sum += u as u32;
                    v_sum += v as u32;
                    n += 1;
                }
            }
            u_samples[cy * cw + cx] = ((u_sum + n / 2) / n) as u8;
            v_samples[cy * cw + cx] = ((v_sum + n / 2) / n) as u8;
        }
    }

    let (u, v) = match layout {
        ChromaLayout::I420 => {
            let stride = cw + row_padding;
            let pad = |samples: &[u8]| {
                let mut plane = vec![0u8; stride * ch];
                for (row, src) in samples.chunks_exact(cw).enumerate() {
                    plane[row * stride..row * stride + cw].copy_from_slice(src);
                }
                Plane::new(Arc::from(plane), stride, 1)
            };
            (pad(&u_samples), pad(&v_samples))
        }
        ChromaLayout::Nv21 => {
            let stride = cw * 2 + row_padding;
            let mut vu = vec![0u8; stride * ch];
            for row in 0..ch {
                for col in 0..cw {
                    vu[row * stride + col * 2] = v_samples[row * cw + col];
                    vu[row * stride + col * 2 + 1] = u_samples[row * cw + col];
                }
            }
            // The U view starts one byte into the shared V/U buffer
            let u_view: Arc<[u8]> = Arc::from(&vu[1..]);
            (
                Plane::new(u_view, stride, 2),
                Plane::new(Arc::from(vu), stride, 2),
            )
        }
    };

    Ok(Frame {
        width,
        height,
        rotation: SensorRotation::None,
        y: Plane::new(Arc::from(luma), y_stride, 1),
        u,
        v,
        captured_at: Instant::now(),
    })
}

/// Interpret a raw I420 buffer (Y, U, V planes back to back, no padding)
pub fn frame_from_i420(
    width: u32,
    height: u32,
    data: &[u8],
    rotation: SensorRotation,
) -> Result<Frame, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyFrame);
    }
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let (luma_len, chroma_len) = (w * h, cw * ch);
    let required = luma_len + chroma_len * 2;
    if data.len() < required {
        return Err(FrameError::PlaneTooShort {
            plane: PlaneKind::Luma,
            required,
            actual: data.len(),
        });
    }

    Ok(Frame {
        width,
        height,
        rotation,
        y: Plane::packed(&data[..luma_len], w),
        u: Plane::packed(&data[luma_len..luma_len + chroma_len], cw),
        v: Plane::packed(&data[luma_len + chroma_len..required], cw),
        captured_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_yuv_reference_colors() {
        assert_eq!(rgb_to_yuv(0, 0, 0), (16, 128, 128));
        assert_eq!(rgb_to_yuv(255, 255, 255), (235, 128, 128));
    }

    #[test]
    fn test_nv21_layout_shares_interleaved_samples() {
        let rgba = [255u8, 0, 0, 255].repeat(4);
        let frame = frame_from_rgba(2, 2, &rgba, ChromaLayout::Nv21, 3).unwrap();
        assert_eq!(frame.u.pixel_stride, 2);
        assert_eq!(frame.v.row_stride, 5);
        assert_eq!(frame.v.data[1], frame.u.sample(0, 0));
        assert_eq!(frame.y.row_stride, 5);
    }

    #[test]
    fn test_short_rgba_is_rejected() {
        let err = frame_from_rgba(2, 2, &[0u8; 8], ChromaLayout::I420, 0).unwrap_err();
        assert!(matches!(err, FrameError::PlaneTooShort { .. }));
    }

    #[test]
    fn test_frame_from_i420_splits_planes() {
        let mut data = vec![10u8; 16];
        data.extend_from_slice(&[20, 20, 20, 20, 30, 30, 30, 30]);
        let frame = frame_from_i420(4, 4, &data, SensorRotation::Rotate180).unwrap();
        assert_eq!(frame.y.sample(3, 3), 10);
        assert_eq!(frame.u.sample(1, 1), 20);
        assert_eq!(frame.v.sample(0, 1), 30);
        assert_eq!(frame.rotation, SensorRotation::Rotate180);

        assert!(frame_from_i420(4, 4, &data[..20], SensorRotation::None).is_err());
    }
}
