//! Canonical frame representation.
//!
//! - `Frame`: owned pixel buffer with geometry, channel layout and capture time.
//! - `FrameInput`: the single tagged variant accepted at the ingestion boundary.
//!
//! Every stage downstream of ingestion works on `Frame` only. Decoded images and
//! image paths are normalized through `FrameInput::normalize` first, so detection
//! code never inspects what kind of input it was handed.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::{PipelineError, PipelineResult};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Pixel layout of a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channels {
    Luma,
    Rgb,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Luma => 1,
            Channels::Rgb => 3,
        }
    }
}

/// A single captured frame.
///
/// Frames are owned by whoever produced them until handed to a consuming stage.
/// Stages borrow frames for the duration of a call and keep nothing afterwards.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: Channels,
    captured_at: DateTime<Local>,
}

impl Frame {
    /// Wrap a raw interleaved buffer. The length must match `width * height * channels`.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: Channels,
        captured_at: DateTime<Local>,
    ) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidFrame(format!(
                "empty frame geometry {}x{}",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(channels.count()))
            .ok_or_else(|| PipelineError::InvalidFrame("frame dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "buffer length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            captured_at,
        })
    }

    pub fn from_rgb_image(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            channels: Channels::Rgb,
            captured_at,
        }
    }

    pub fn from_luma_image(image: GrayImage, captured_at: DateTime<Local>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            channels: Channels::Luma,
            captured_at,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Single intensity channel view of this frame.
    pub fn to_luma(&self) -> GrayImage {
        match self.channels {
            Channels::Luma => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| GrayImage::new(self.width, self.height)),
            Channels::Rgb => image::imageops::grayscale(&self.to_rgb()),
        }
    }

    /// Three-channel copy of this frame (luma frames are replicated).
    pub fn to_rgb(&self) -> RgbImage {
        match self.channels {
            Channels::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| RgbImage::new(self.width, self.height)),
            Channels::Luma => {
                let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
                RgbImage::from_raw(self.width, self.height, data)
                    .unwrap_or_else(|| RgbImage::new(self.width, self.height))
            }
        }
    }

    /// Horizontally mirrored copy, as a front-facing camera is usually viewed.
    pub fn mirrored(&self) -> Self {
        let step = self.channels.count();
        let row_len = self.width as usize * step;
        if row_len == 0 {
            return self.clone();
        }
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len) {
            for px in row.chunks_exact(step).rev() {
                data.extend_from_slice(px);
            }
        }
        Self {
            data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            captured_at: self.captured_at,
        }
    }

    /// Require that `other` has the same width and height.
    pub fn ensure_same_geometry(&self, other: &Frame) -> PipelineResult<()> {
        if self.width != other.width || self.height != other.height {
            return Err(PipelineError::FrameMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// FrameInput: ingestion boundary
// ----------------------------------------------------------------------------

/// Anything a caller may hand to the pipeline in place of a frame.
#[derive(Debug)]
pub enum FrameInput {
    /// Already canonical.
    Frame(Frame),
    /// Decoded image with its capture time.
    Image {
        image: DynamicImage,
        captured_at: DateTime<Local>,
    },
    /// Still image on local disk. Capture time is the moment of loading.
    Path(PathBuf),
}

impl FrameInput {
    pub fn normalize(self) -> PipelineResult<Frame> {
        match self {
            FrameInput::Frame(frame) => Ok(frame),
            FrameInput::Image { image, captured_at } => image_to_frame(image, captured_at),
            FrameInput::Path(path) => {
                let image = image::open(&path).map_err(|e| {
                    PipelineError::InvalidFrame(format!("cannot decode {}: {}", path.display(), e))
                })?;
                image_to_frame(image, Local::now())
            }
        }
    }
}

impl From<Frame> for FrameInput {
    fn from(frame: Frame) -> Self {
        FrameInput::Frame(frame)
    }
}

impl From<PathBuf> for FrameInput {
    fn from(path: PathBuf) -> Self {
        FrameInput::Path(path)
    }
}

fn image_to_frame(image: DynamicImage, captured_at: DateTime<Local>) -> PipelineResult<Frame> {
    let (width, height) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(gray) => {
            Frame::new(gray.into_raw(), width, height, Channels::Luma, captured_at)
        }
        other => Frame::new(
            other.to_rgb8().into_raw(),
            width,
            height,
            Channels::Rgb,
            captured_at,
        ),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
