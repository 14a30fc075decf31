//! Frame type and pixel conversions — 0–1 floats, BGR order, resizing.
//!
//! Every frame handed to a landmark provider is 8-bit RGB, row-major.
//! Buffers in any other convention are converted here, once, by a function
//! that names the source convention explicitly.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

const CHANNELS: usize = 3;

/// Channel order of an incoming interleaved 3-channel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// OpenCV-style blue/green/red.
    Bgr,
}

/// A decoded RGB8 image or video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap an 8-bit buffer, reordering channels to RGB if needed.
    pub fn from_bytes(
        mut data: Vec<u8>,
        width: u32,
        height: u32,
        order: ChannelOrder,
    ) -> Result<Self, FrameError> {
        check_len(data.len(), width, height)?;
        if order == ChannelOrder::Bgr {
            for px in data.chunks_exact_mut(CHANNELS) {
                px.swap(0, 2);
            }
        }
        Ok(Self { data, width, height })
    }

    /// Convert a buffer of 0.0–1.0 floats into the canonical 8-bit form.
    ///
    /// Values outside [0, 1] (including NaN) are rejected rather than clamped:
    /// they mean the caller mislabelled the pixel range.
    pub fn from_unit_floats(
        data: &[f32],
        width: u32,
        height: u32,
        order: ChannelOrder,
    ) -> Result<Self, FrameError> {
        check_len(data.len(), width, height)?;
        let bytes = data
            .iter()
            .enumerate()
            .map(|(index, &v)| unit_to_byte(v).ok_or(FrameError::OutOfRange { index, value: v }))
            .collect::<Result<Vec<u8>, _>>()?;
        Self::from_bytes(bytes, width, height, order)
    }

    /// Convert a decoded image, optionally resizing it to `size`×`size`.
    pub fn from_image(image: DynamicImage, size: Option<u32>) -> Self {
        let rgb = match size {
            Some(s) if image.width() != s || image.height() != s => {
                image.resize_exact(s, s, FilterType::Triangle).into_rgb8()
            }
            _ => image.into_rgb8(),
        };
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
        }
    }

    /// Copy into an `image` buffer for resampling.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Map one 0–1 float to 0–255, or `None` if it is outside the unit range.
pub fn unit_to_byte(v: f32) -> Option<u8> {
    if !(0.0..=1.0).contains(&v) {
        return None;
    }
    Some((v * 255.0).round() as u8)
}

fn check_len(actual: usize, width: u32, height: u32) -> Result<(), FrameError> {
    let expected = width as usize * height as usize * CHANNELS;
    if expected == 0 || actual != expected {
        return Err(FrameError::InvalidLength { expected, actual });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid RGB buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("pixel value {value} at index {index} is outside the 0–1 range")]
    OutOfRange { index: usize, value: f32 },
}
