//! Local video file source using FFmpeg.
//!
//! Decodes the best video track of a local file and converts each picture to
//! RGB24 in memory. End of file is reported as `StreamExhausted` once every
//! buffered picture has been drained from the decoder.

use std::time::Instant;

use chrono::Local;
use ffmpeg_next as ffmpeg;

use super::{FrameSource, SourceConfig, SourceStats};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Channels, Frame};

pub(crate) struct FfmpegFileSource {
    config: SourceConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    connected_at: Option<Instant>,
    eof_sent: bool,
    last_error: Option<String>,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: SourceConfig) -> PipelineResult<Self> {
        let uri = config.uri.trim().to_string();
        let unavailable = |reason: String| PipelineError::device(uri.clone(), reason);

        ffmpeg::init().map_err(|e| unavailable(format!("initialize ffmpeg: {e}")))?;
        let input = ffmpeg::format::input(&uri).map_err(|e| unavailable(e.to_string()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unavailable("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| unavailable(format!("load decoder parameters: {e}")))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| unavailable(format!("open video decoder: {e}")))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| unavailable(format!("create scaler: {e}")))?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            connected_at: None,
            eof_sent: false,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> PipelineResult<()> {
        self.connected_at = Some(Instant::now());
        log::info!(
            "FfmpegFileSource: opened {} ({}x{})",
            self.config.uri,
            self.decoder.width(),
            self.decoder.height()
        );
        Ok(())
    }

    /// Pull one decoded picture out of the decoder, if it has one ready.
    fn receive(&mut self) -> PipelineResult<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| PipelineError::InvalidFrame(format!("scale frame to RGB: {e}")))?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frame_count += 1;
        Frame::new(pixels, width, height, Channels::Rgb, Local::now()).map(Some)
    }
}

impl FrameSource for FfmpegFileSource {
    fn next_frame(&mut self) -> PipelineResult<Frame> {
        if self.connected_at.is_none() {
            return Err(PipelineError::StreamExhausted);
        }
        if self
            .config
            .max_frames
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Err(PipelineError::StreamExhausted);
        }

        loop {
            if let Some(frame) = self.receive()? {
                return Ok(frame);
            }
            if self.eof_sent {
                return Err(PipelineError::StreamExhausted);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    if let Err(err) = self.decoder.send_packet(&packet) {
                        log::warn!("FfmpegFileSource: dropping packet: {}", err);
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.eof_sent = true;
                    // Flush so pictures still held by the decoder come out.
                    let _ = self.decoder.send_eof();
                }
                Err(err) => {
                    log::warn!("FfmpegFileSource: read {} failed: {}", self.config.uri, err);
                    self.last_error = Some(err.to_string());
                    return Err(PipelineError::StreamExhausted);
                }
            }
        }
    }

    fn close(&mut self) {
        if self.connected_at.take().is_some() {
            log::info!(
                "FfmpegFileSource: closed {} after {} frames",
                self.config.uri,
                self.frame_count
            );
        }
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.connected_at.is_some() && !self.eof_sent
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> PipelineResult<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let pixels = data.get(..row_bytes * height as usize).ok_or_else(|| {
            PipelineError::InvalidFrame("decoded frame is shorter than its geometry".into())
        })?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).ok_or_else(|| {
            PipelineError::InvalidFrame("decoded frame row is out of bounds".into())
        })?);
    }

    Ok((pixels, width, height))
}
