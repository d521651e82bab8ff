//! Still-image sequence source.
//!
//! Reads every `png`, `jpg`/`jpeg` and `bmp` file of a local directory in
//! filename order, one image per frame. Useful for replaying captures without a
//! camera and for deterministic tests.

use std::path::{Path, PathBuf};

use chrono::Local;

use super::{FrameSource, SourceConfig, SourceStats};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, FrameInput};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    connected: bool,
}

impl ImageSequenceSource {
    pub fn new(config: SourceConfig) -> PipelineResult<Self> {
        let dir = Path::new(config.uri.trim());
        let files = list_images(dir)
            .map_err(|e| PipelineError::device(config.uri.clone(), e))?;
        if files.is_empty() {
            return Err(PipelineError::device(
                config.uri.clone(),
                "directory contains no images",
            ));
        }
        Ok(Self {
            config,
            files,
            cursor: 0,
            frame_count: 0,
            connected: false,
        })
    }

    pub fn connect(&mut self) -> PipelineResult<()> {
        self.connected = true;
        log::info!(
            "ImageSequenceSource: {} images in {}",
            self.files.len(),
            self.config.uri
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> PipelineResult<Frame> {
        if !self.connected {
            return Err(PipelineError::StreamExhausted);
        }
        if self
            .config
            .max_frames
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Err(PipelineError::StreamExhausted);
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Err(PipelineError::StreamExhausted);
        };
        self.cursor += 1;

        let image = image::open(path).map_err(|e| {
            PipelineError::InvalidFrame(format!("cannot decode {}: {}", path.display(), e))
        })?;
        self.frame_count += 1;
        FrameInput::Image {
            image,
            captured_at: Local::now(),
        }
        .normalize()
    }

    fn close(&mut self) {
        if self.connected {
            log::debug!(
                "ImageSequenceSource: closed {} after {} frames",
                self.config.uri,
                self.frame_count
            );
        }
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected && self.cursor < self.files.len()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }
}
