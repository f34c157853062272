// SPDX-License-Identifier: GPL-3.0-only

//! Planar YUV 4:2:0 to RGBA conversion for recognizer input
//!
//! Conversion runs in two passes over buffers owned by the converter:
//!
//! 1. The three planes are gathered into an NV21 scratch buffer (luma, then
//!    interleaved V/U per 2x2 block), honoring each plane's row and pixel
//!    stride. Chroma planes on real hardware are rarely packed.
//! 2. The scratch buffer is transformed to RGBA scanline by scanline with
//!    rayon, writing the image upright according to the frame rotation.
//!
//! Both buffers are reused across frames and only reallocated when the
//! frame dimensions change.

use crate::backends::camera::types::{Frame, Plane, Resolution, SensorRotation};
use crate::constants::RGBA_BYTES_PER_PIXEL;
use crate::errors::{FrameError, PlaneKind};
use image::RgbaImage;
use rayon::prelude::*;
use tracing::{debug, trace};

/// Packed RGBA pixels, reused across conversions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ColorBuffer {
    /// Wrap existing RGBA bytes; `None` if the length does not match
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * RGBA_BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        RGBA_BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// RGBA value at (x, y)
    ///
    /// Coordinates must lie inside the buffer; see [`Self::get_pixel`].
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        debug_assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} buffer",
            self.width,
            self.height
        );
        let offset = (y as usize * self.width as usize + x as usize) * RGBA_BYTES_PER_PIXEL;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    /// RGBA value at (x, y), or `None` outside the buffer
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width && y < self.height).then(|| self.pixel(x, y))
    }

    /// BT.601 luma of the pixel at (x, y); coordinates must be in bounds
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        debug_assert!(x < self.width && y < self.height);
        let offset = (y as usize * self.width as usize + x as usize) * RGBA_BYTES_PER_PIXEL;
        let r = self.data[offset] as u32;
        let g = self.data[offset + 1] as u32;
        let b = self.data[offset + 2] as u32;
        ((r * 77 + g * 150 + b * 29) >> 8) as u8
    }

    /// Copy a sub-rectangle into a new buffer
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<ColorBuffer, FrameError> {
        let fits = width > 0
            && height > 0
            && x.checked_add(width).is_some_and(|r| r <= self.width)
            && y.checked_add(height).is_some_and(|b| b <= self.height);
        if !fits {
            return Err(FrameError::RegionOutOfBounds);
        }

        let src_stride = self.width as usize * RGBA_BYTES_PER_PIXEL;
        let row_bytes = width as usize * RGBA_BYTES_PER_PIXEL;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in y as usize..(y + height) as usize {
            let start = row * src_stride + x as usize * RGBA_BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Ok(ColorBuffer {
            width,
            height,
            data,
        })
    }

    /// Copy into an `image` buffer (for saving or external recognizers)
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Converts planar YUV frames to upright RGBA
///
/// Not shareable between threads: one converter belongs to one recognition
/// worker, which handles one frame at a time.
#[derive(Debug, Default)]
pub struct FrameColorConverter {
    yuv_scratch: Vec<u8>,
    rgb_output: ColorBuffer,
    /// Source dimensions the buffers are currently sized for
    allocated: Option<(u32, u32)>,
    reallocations: u64,
}

impl FrameColorConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a frame, returning the reused output buffer
    ///
    /// On error nothing is read out of bounds and the previous output is left
    /// untouched; the caller skips the frame.
    pub fn convert(&mut self, frame: &Frame) -> Result<&ColorBuffer, FrameError> {
        let chroma = validate_frame(frame)?;
        self.ensure_capacity(frame);

        let start = std::time::Instant::now();
        fill_nv21(frame, chroma, &mut self.yuv_scratch);

        let upright = frame.upright_resolution();
        self.rgb_output.width = upright.width;
        self.rgb_output.height = upright.height;
        nv21_to_rgba(
            &self.yuv_scratch,
            frame.width as usize,
            frame.height as usize,
            chroma,
            frame.rotation,
            &mut self.rgb_output.data,
        );

        trace!(
            width = upright.width,
            height = upright.height,
            rotation = %frame.rotation,
            convert_us = start.elapsed().as_micros() as u64,
            "Converted frame to RGBA"
        );

        Ok(&self.rgb_output)
    }

    /// Most recently converted image
    pub fn output(&self) -> &ColorBuffer {
        &self.rgb_output
    }

    /// How many times the internal buffers were (re)allocated
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    fn ensure_capacity(&mut self, frame: &Frame) {
        let dims = (frame.width, frame.height);
        if self.allocated == Some(dims) {
            return;
        }

        let (cw, ch) = frame.chroma_dimensions();
        let luma = frame.resolution().pixel_count();
        self.yuv_scratch = vec![0; luma + cw * ch * 2];
        self.rgb_output.data = vec![0; luma * RGBA_BYTES_PER_PIXEL];
        self.allocated = Some(dims);
        self.reallocations += 1;

        debug!(
            width = frame.width,
            height = frame.height,
            scratch_bytes = self.yuv_scratch.len(),
            output_bytes = self.rgb_output.data.len(),
            "Allocated conversion buffers"
        );
    }
}

/// Number of bytes a plane must hold for `cols` x `rows` samples
fn required_len(plane: &Plane, cols: usize, rows: usize) -> Option<usize> {
    let last_row = (rows - 1).checked_mul(plane.row_stride)?;
    let last_col = (cols - 1).checked_mul(plane.pixel_stride)?;
    last_row.checked_add(last_col)?.checked_add(1)
}

fn validate_plane(
    kind: PlaneKind,
    plane: &Plane,
    cols: usize,
    rows: usize,
) -> Result<(), FrameError> {
    let row_span = (cols - 1)
        .checked_mul(plane.pixel_stride)
        .and_then(|v| v.checked_add(1));
    let strides_ok = plane.pixel_stride > 0
        && row_span.is_some_and(|span| rows == 1 || plane.row_stride >= span);
    if !strides_ok {
        return Err(FrameError::InvalidStride {
            plane: kind,
            row_stride: plane.row_stride,
            pixel_stride: plane.pixel_stride,
        });
    }

    let required = required_len(plane, cols, rows).unwrap_or(usize::MAX);
    if plane.data.len() < required {
        return Err(FrameError::PlaneTooShort {
            plane: kind,
            required,
            actual: plane.data.len(),
        });
    }
    Ok(())
}

fn validate_chroma(frame: &Frame, (cw, ch): (usize, usize)) -> Result<(), FrameError> {
    validate_plane(PlaneKind::ChromaU, &frame.u, cw, ch)?;
    validate_plane(PlaneKind::ChromaV, &frame.v, cw, ch)
}

/// Check that every sample the conversion reads lies inside its plane
///
/// Returns the chroma columns and rows to read. Odd widths and heights
/// accept chroma planes of either `w/2` or `ceil(w/2)` samples; with the
/// shorter plane the trailing luma column or row reuses its neighbor's
/// chroma.
pub fn validate_frame(frame: &Frame) -> Result<(usize, usize), FrameError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(FrameError::EmptyFrame);
    }
    let (w, h) = (frame.width as usize, frame.height as usize);
    validate_plane(PlaneKind::Luma, &frame.y, w, h)?;

    let (full_w, full_h) = frame.chroma_dimensions();
    let (half_w, half_h) = ((w / 2).max(1), (h / 2).max(1));
    for dims in [(full_w, full_h), (full_w, half_h), (half_w, full_h)] {
        if validate_chroma(frame, dims).is_ok() {
            return Ok(dims);
        }
    }
    validate_chroma(frame, (half_w, half_h))?;
    Ok((half_w, half_h))
}

/// Gather the planes into NV21 order (Y, then V/U pairs)
fn fill_nv21(frame: &Frame, (cw, ch): (usize, usize), scratch: &mut [u8]) {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let (luma, chroma) = scratch.split_at_mut(w * h);

    if frame.y.pixel_stride == 1 {
        for (row, dst) in luma.chunks_exact_mut(w).enumerate() {
            let start = row * frame.y.row_stride;
            dst.copy_from_slice(&frame.y.data[start..start + w]);
        }
    } else {
        for (row, dst) in luma.chunks_exact_mut(w).enumerate() {
            for (col, out) in dst.iter_mut().enumerate() {
                *out = frame.y.sample(col, row);
            }
        }
    }

    for (row, dst) in chroma.chunks_exact_mut(cw * 2).take(ch).enumerate() {
        for col in 0..cw {
            dst[col * 2] = frame.v.sample(col, row);
            dst[col * 2 + 1] = frame.u.sample(col, row);
        }
    }
}

/// BT.601 limited-range YUV to RGB, 8-bit fixed point
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (y as i32 - 16);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        ((c + 409 * e + 128) >> 8).clamp(0, 255) as u8,
        ((c - 100 * d - 208 * e + 128) >> 8).clamp(0, 255) as u8,
        ((c + 516 * d + 128) >> 8).clamp(0, 255) as u8,
    ]
}

/// Source pixel for an upright output pixel
#[inline]
fn source_coords(
    ox: usize,
    oy: usize,
    width: usize,
    height: usize,
    rotation: SensorRotation,
) -> (usize, usize) {
    match rotation {
        SensorRotation::None => (ox, oy),
        SensorRotation::Rotate90 => (oy, height - 1 - ox),
        SensorRotation::Rotate180 => (width - 1 - ox, height - 1 - oy),
        SensorRotation::Rotate270 => (width - 1 - oy, ox),
    }
}

fn nv21_to_rgba(
    nv21: &[u8],
    width: usize,
    height: usize,
    (cw, ch): (usize, usize),
    rotation: SensorRotation,
    output: &mut [u8],
) {
    let (luma, chroma) = nv21.split_at(width * height);
    let chroma_stride = cw * 2;
    let out_width = if rotation.swaps_dimensions() {
        height
    } else {
        width
    };

    output
        .par_chunks_mut(out_width * RGBA_BYTES_PER_PIXEL)
        .enumerate()
        .for_each(|(oy, row)| {
            if rotation == SensorRotation::None {
                let uv_row = &chroma[(oy / 2).min(ch - 1) * chroma_stride..];
                process_row(&luma[oy * width..(oy + 1) * width], uv_row, cw, row);
                return;
            }
            for (ox, px) in row.chunks_exact_mut(RGBA_BYTES_PER_PIXEL).enumerate() {
                let (sx, sy) = source_coords(ox, oy, width, height, rotation);
                let uv = (sy / 2).min(ch - 1) * chroma_stride + (sx / 2).min(cw - 1) * 2;
                let rgb = yuv_to_rgb(luma[sy * width + sx], chroma[uv + 1], chroma[uv]);
                px[..3].copy_from_slice(&rgb);
                px[3] = 255;
            }
        });
}

/// Unrotated scanline: pixel pairs share one chroma sample
#[inline]
fn process_row(y_row: &[u8], uv_row: &[u8], chroma_cols: usize, row: &mut [u8]) {
    for (pair, pixels) in row.chunks_mut(RGBA_BYTES_PER_PIXEL * 2).enumerate() {
        let c = pair.min(chroma_cols - 1) * 2;
        let v = uv_row[c];
        let u = uv_row[c + 1];
        for (i, px) in pixels.chunks_exact_mut(RGBA_BYTES_PER_PIXEL).enumerate() {
            let rgb = yuv_to_rgb(y_row[pair * 2 + i], u, v);
            px[..3].copy_from_slice(&rgb);
            px[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32, y: u8, u: u8, v: u8) -> Frame {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        Frame {
            width,
            height,
            rotation: SensorRotation::None,
            y: Plane::packed(vec![y; w * h], w),
            u: Plane::packed(vec![u; cw * ch], cw),
            v: Plane::packed(vec![v; cw * ch], cw),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_yuv_to_rgb_reference_colors() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        let red = yuv_to_rgb(81, 90, 240);
        assert!(red[0] >= 253 && red[1] <= 2 && red[2] <= 2, "{:?}", red);
    }

    #[test]
    fn test_gray_frame() {
        let mut converter = FrameColorConverter::new();
        let out = converter.convert(&solid_frame(4, 4, 126, 128, 128)).unwrap();
        assert_eq!(out.len(), 4 * 4 * 4);
        for chunk in out.as_bytes().chunks_exact(4) {
            assert_eq!(chunk, &[128, 128, 128, 255]);
        }
    }

    #[test]
    fn test_buffers_reused_for_same_dimensions() {
        let mut converter = FrameColorConverter::new();
        converter.convert(&solid_frame(8, 6, 100, 128, 128)).unwrap();
        converter.convert(&solid_frame(8, 6, 50, 128, 128)).unwrap();
        assert_eq!(converter.reallocations(), 1);

        converter.convert(&solid_frame(6, 4, 50, 128, 128)).unwrap();
        assert_eq!(converter.reallocations(), 2);
        assert_eq!(converter.output().len(), 6 * 4 * 4);
    }

    #[test]
    fn test_short_luma_plane_is_rejected() {
        let mut frame = solid_frame(4, 4, 100, 128, 128);
        frame.y = Plane::packed(vec![0u8; 15], 4);
        let err = FrameColorConverter::new().convert(&frame).unwrap_err();
        assert_eq!(
            err,
            FrameError::PlaneTooShort {
                plane: PlaneKind::Luma,
                required: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn test_zero_pixel_stride_is_rejected() {
        let mut frame = solid_frame(4, 4, 100, 128, 128);
        frame.u = Plane::new(Arc::from(vec![128u8; 4].as_slice()), 2, 0);
        assert!(matches!(
            validate_frame(&frame),
            Err(FrameError::InvalidStride {
                plane: PlaneKind::ChromaU,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let frame = solid_frame(0, 4, 0, 0, 0);
        assert_eq!(validate_frame(&frame), Err(FrameError::EmptyFrame));
    }

    #[test]
    fn test_interleaved_chroma_with_row_padding() {
        // 2x2 frame, chroma planes as views with pixel stride 2 and padded rows
        let mut frame = solid_frame(2, 2, 81, 0, 0);
        frame.u = Plane::new(Arc::from(vec![90u8, 7, 7, 7].as_slice()), 4, 2);
        frame.v = Plane::new(Arc::from(vec![240u8, 7, 7, 7].as_slice()), 4, 2);

        let mut converter = FrameColorConverter::new();
        let out = converter.convert(&frame).unwrap();
        let px = out.pixel(1, 1);
        assert!(px[0] >= 253 && px[1] <= 2 && px[2] <= 2, "{:?}", px);
    }

    #[test]
    fn test_rotation_swaps_output_dimensions() {
        // Luma gradient along x on a 4x2 frame
        let mut frame = solid_frame(4, 2, 0, 128, 128);
        frame.y = Plane::packed(vec![16u8, 60, 120, 235, 16, 60, 120, 235], 4);
        frame.rotation = SensorRotation::Rotate90;

        let mut converter = FrameColorConverter::new();
        let out = converter.convert(&frame).unwrap();
        assert_eq!((out.width(), out.height()), (2, 4));
        // Source row 0 runs down the right-hand column after a clockwise turn
        assert_eq!(out.pixel(1, 0)[0], 0);
        assert_eq!(out.pixel(1, 3)[0], 255);
        assert_eq!(converter.reallocations(), 1);
    }

    #[test]
    fn test_floor_sized_chroma_planes() {
        // 7x5 with 3x2 chroma: the last column and row borrow their neighbors
        let mut frame = solid_frame(7, 5, 126, 0, 0);
        frame.u = Plane::packed(vec![128u8; 6], 3);
        frame.v = Plane::packed(vec![128u8; 6], 3);
        assert_eq!(validate_frame(&frame), Ok((3, 2)));

        let mut converter = FrameColorConverter::new();
        let out = converter.convert(&frame).unwrap();
        assert_eq!(out.resolution(), Resolution::new(7, 5));
        for chunk in out.as_bytes().chunks_exact(4) {
            assert_eq!(chunk, &[128, 128, 128, 255]);
        }

        frame.rotation = SensorRotation::Rotate270;
        let out = converter.convert(&frame).unwrap();
        assert_eq!(out.resolution(), Resolution::new(5, 7));
        assert_eq!(out.pixel(4, 6), [128, 128, 128, 255]);
    }

    #[test]
    fn test_full_chroma_preferred_for_odd_frames() {
        let frame = solid_frame(5, 3, 126, 128, 128);
        assert_eq!(validate_frame(&frame), Ok((3, 2)));
        let frame = solid_frame(1, 1, 126, 128, 128);
        assert_eq!(validate_frame(&frame), Ok((1, 1)));
    }

    #[test]
    fn test_get_pixel_bounds() {
        let buffer = ColorBuffer::from_rgba(2, 2, vec![9u8; 16]).unwrap();
        assert_eq!(buffer.get_pixel(1, 1), Some([9, 9, 9, 9]));
        assert_eq!(buffer.get_pixel(2, 0), None);
        assert_eq!(buffer.get_pixel(0, 2), None);
    }

    #[test]
    #[should_panic]
    fn test_pixel_out_of_bounds_panics() {
        let buffer = ColorBuffer::from_rgba(2, 2, vec![9u8; 16]).unwrap();
        buffer.pixel(0, 2);
    }

    #[test]
    fn test_crop() {
        let data: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        let buffer = ColorBuffer::from_rgba(4, 4, data).unwrap();
        let cropped = buffer.crop(1, 2, 2, 2).unwrap();
        assert_eq!(cropped.resolution(), Resolution::new(2, 2));
        assert_eq!(cropped.pixel(0, 0), buffer.pixel(1, 2));
        assert_eq!(cropped.pixel(1, 1), buffer.pixel(2, 3));

        assert_eq!(buffer.crop(3, 0, 2, 1), Err(FrameError::RegionOutOfBounds));
        assert_eq!(buffer.crop(0, 0, 0, 1), Err(FrameError::RegionOutOfBounds));
    }
}
