//! Borrowed camera frames and grayscale conversion.

use crate::GrayImage;
use serde::{Deserialize, Serialize};

/// Pixel layout of a [`Frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Bgr8,
    Rgba8,
    /// 32-bit BGRA, the usual layout of mobile camera capture buffers.
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }

    /// Default interleaved RGB(A) layout for a channel count.
    pub fn from_channels(channels: usize) -> Result<Self, FrameError> {
        match channels {
            1 => Ok(PixelFormat::Gray8),
            3 => Ok(PixelFormat::Rgb8),
            4 => Ok(PixelFormat::Rgba8),
            other => Err(FrameError::UnsupportedChannels(other)),
        }
    }

    /// Byte offsets of the red, green and blue samples inside one pixel.
    fn rgb_offsets(self) -> Option<[usize; 3]> {
        match self {
            PixelFormat::Gray8 => None,
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => Some([0, 1, 2]),
            PixelFormat::Bgr8 | PixelFormat::Bgra8 => Some([2, 1, 0]),
        }
    }
}

/// Errors for malformed input frames.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has zero area ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },
    #[error("row stride {stride} is smaller than a packed row ({row_bytes} bytes)")]
    InvalidStride { stride: usize, row_bytes: usize },
    #[error("frame buffer too small (expected at least {expected} bytes, got {got})")]
    BufferTooSmall { expected: usize, got: usize },
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),
    #[error("frame size {width}x{height} with stride {stride} overflows the address space")]
    DimensionsOverflow {
        width: usize,
        height: usize,
        stride: usize,
    },
}

/// One captured image, borrowed from the caller for the duration of a call.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub width: usize,
    pub height: usize,
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Tightly packed frame (`stride = width * channels`).
    ///
    /// An overflowing stride saturates; [`Frame::validate`] rejects it.
    pub fn new(data: &'a [u8], width: usize, height: usize, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            stride: width.saturating_mul(format.channels()),
            format,
            data,
        }
    }

    /// Frame with padded rows, as handed out by most capture APIs.
    pub fn with_stride(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
        format: PixelFormat,
    ) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            data,
        }
    }

    /// Check that the frame describes a non-empty image backed by enough bytes.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        let overflow = FrameError::DimensionsOverflow {
            width: self.width,
            height: self.height,
            stride: self.stride,
        };
        let row_bytes = self
            .width
            .checked_mul(self.format.channels())
            .ok_or(overflow.clone())?;
        if self.stride < row_bytes {
            return Err(FrameError::InvalidStride {
                stride: self.stride,
                row_bytes,
            });
        }
        // The last row does not need its padding.
        let expected = self
            .stride
            .checked_mul(self.height - 1)
            .and_then(|bytes| bytes.checked_add(row_bytes))
            .ok_or(overflow)?;
        if self.data.len() < expected {
            return Err(FrameError::BufferTooSmall {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Convert to an 8-bit luminance image (BT.601 weights).
    pub fn to_gray(&self) -> Result<GrayImage, FrameError> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.width * self.height);
        let channels = self.format.channels();

        for y in 0..self.height {
            let row = &self.data[y * self.stride..y * self.stride + self.width * channels];
            match self.format.rgb_offsets() {
                None => out.extend_from_slice(row),
                Some([r, g, b]) => {
                    out.extend(row.chunks_exact(channels).map(|px| {
                        luma(px[r], px[g], px[b])
                    }));
                }
            }
        }

        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data: out,
        })
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}
