//! V4L2 capture device source (`/dev/videoN`).
//!
//! Negotiates `RGB3` at the requested geometry and falls back to whatever the
//! driver reports (`YUYV` is converted). Frames are delivered in capture order
//! from a four-buffer mmap stream. A capture failure after connect (device
//! unplugged, driver reset) ends the stream.

use std::time::{Duration, Instant};

use chrono::Local;
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceConfig, SourceStats};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Channels, Frame};

const STREAM_BUFFERS: u32 = 4;

pub struct V4l2Source {
    config: SourceConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    pixel_format: PixelFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
            pixel_format: PixelFormat::Rgb24,
        }
    }

    pub fn connect(&mut self) -> PipelineResult<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let uri = self.config.uri.clone();
        let mut device = v4l::Device::with_path(&uri)
            .map_err(|e| PipelineError::device(uri.clone(), e))?;
        let mut format = device
            .format()
            .map_err(|e| PipelineError::device(uri.clone(), format!("read format: {e}")))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", uri, err);
                device.format().map_err(|e| {
                    PipelineError::device(uri.clone(), format!("read format after set failure: {e}"))
                })?
            }
        };
        self.pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            PipelineError::device(
                uri.clone(),
                format!("unsupported pixel format {}", format.fourcc),
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", uri, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            PipelineError::device(uri.clone(), format!("create buffer stream: {err}"))
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            uri,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn next_frame(&mut self) -> PipelineResult<Frame> {
        use v4l::io::traits::CaptureStream;

        if self
            .config
            .max_frames
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Err(PipelineError::StreamExhausted);
        }
        let state = self.state.as_mut().ok_or(PipelineError::StreamExhausted)?;
        let captured = state.with_mut(|fields| {
            fields
                .stream
                .next()
                .map(|(buf, _meta)| buf.to_vec())
        });
        let raw = match captured {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("V4l2Source: capture on {} failed: {}", self.config.uri, err);
                self.last_error = Some(err.to_string());
                return Err(PipelineError::StreamExhausted);
            }
        };

        let rgb = normalize_to_rgb(&raw, self.active_width, self.active_height, self.pixel_format)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Frame::new(
            rgb,
            self.active_width,
            self.active_height,
            Channels::Rgb,
            Local::now(),
        )
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.config.uri,
                self.frame_count
            );
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }
}
