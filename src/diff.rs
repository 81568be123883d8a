//! Grayscale conversion and frame differencing.
//!
//! The difference image is the only image-processing step in the pipeline:
//! both frames are reduced to 8-bit luminance and subtracted per pixel with
//! absolute value. No thresholding or contour extraction happens here.

use std::fmt;

use crate::camera::Frame;

/// A single-channel 8-bit image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    /// Luminance values, row-major, one byte per pixel
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayFrame {
    /// Build a gray frame from raw luminance data.
    ///
    /// Returns `None` if the buffer length doesn't match the dimensions.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }
}

/// Error for differencing frames of mismatched dimensions.
#[derive(Debug)]
pub struct DimensionMismatch {
    pub left: (u32, u32),
    pub right: (u32, u32),
}

impl fmt::Display for DimensionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot difference {}x{} frame against {}x{} frame",
            self.left.0, self.left.1, self.right.0, self.right.1
        )
    }
}

impl std::error::Error for DimensionMismatch {}

/// Convert an RGB frame to grayscale using the ITU-R BT.601 luminance formula.
///
/// Y = 0.299*R + 0.587*G + 0.114*B, computed with integer math (coefficients
/// scaled by 1000) to keep floating point out of the per-frame path.
pub fn to_grayscale(frame: &Frame) -> GrayFrame {
    let pixel_count = (frame.width * frame.height) as usize;
    let mut gray = Vec::with_capacity(pixel_count);

    for rgb in frame.data.chunks_exact(3) {
        let r = rgb[0] as u32;
        let g = rgb[1] as u32;
        let b = rgb[2] as u32;
        let luminance = (299 * r + 587 * g + 114 * b) / 1000;
        gray.push(luminance as u8);
    }

    GrayFrame {
        data: gray,
        width: frame.width,
        height: frame.height,
    }
}

/// Per-pixel absolute difference of two grayscale frames.
///
/// Symmetric and stateless; identical inputs produce an all-zero image.
pub fn absdiff(a: &GrayFrame, b: &GrayFrame) -> Result<GrayFrame, DimensionMismatch> {
    if a.width != b.width || a.height != b.height {
        return Err(DimensionMismatch {
            left: (a.width, a.height),
            right: (b.width, b.height),
        });
    }

    let data = a
        .data
        .iter()
        .zip(b.data.iter())
        .map(|(&x, &y)| x.abs_diff(y))
        .collect();

    Ok(GrayFrame {
        data,
        width: a.width,
        height: a.height,
    })
}
