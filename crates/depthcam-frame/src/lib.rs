//! Common image representation for the depthcam crates.
//!
//! A [`Frame`] is one interleaved image plane: 8-bit intensity or color
//! samples, or 16-bit depth samples. Adapters produce frames per capture
//! call; nothing here retains buffers between calls.

use std::fmt;

#[derive(Debug, PartialEq)]
pub enum FrameError {
    SizeOverflow,
    SizeMismatch { expected: usize, got: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::SizeOverflow => write!(f, "frame dimensions overflow when multiplied"),
            FrameError::SizeMismatch { expected, got } => {
                write!(f, "frame size mismatch: expected {expected} samples, got {got}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// A single interleaved image plane.
///
/// `data` holds `width * height * channels` samples in row-major order with
/// channels interleaved per pixel. Depth frames are always one channel;
/// color frames keep the sensor's native channel order.
#[derive(Clone, PartialEq)]
pub struct Frame<T> {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<T>,
}

impl<T> fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("samples", &self.data.len())
            .finish()
    }
}

impl<T> Frame<T> {
    /// Build a frame, validating that `data` holds exactly
    /// `width * height * channels` samples.
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<T>) -> Result<Self, FrameError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or(FrameError::SizeOverflow)?;

        if expected != data.len() {
            return Err(FrameError::SizeMismatch {
                expected,
                got: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Number of pixels (not samples).
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Default + Clone> Frame<T> {
    /// A zero-filled frame of the given dimensions.
    pub fn zeros(width: u32, height: u32, channels: u32) -> Result<Self, FrameError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or(FrameError::SizeOverflow)?;

        Ok(Self {
            width,
            height,
            channels,
            data: vec![T::default(); len],
        })
    }
}
