//! Synthetic frame source (`stub://`).
//!
//! Renders a static, slightly noisy background and optionally a bright subject
//! walking across it at constant speed:
//! - `stub://walk-left`: enters near the right edge and walks off the left edge
//! - `stub://walk-right`: enters near the left edge and walks off the right edge
//! - `stub://static` (or any other name): background only
//!
//! The subject crosses the scene once and does not come back.

use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Channels, Frame};

const BACKGROUND_LEVEL: u8 = 60;
const SUBJECT_LEVEL: u8 = 230;
/// Sensor noise amplitude, well below any sane motion threshold.
const NOISE: i16 = 2;
const NOISE_SEED: u64 = 0x5EED_CA11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    WalkLeft,
    WalkRight,
    Static,
}

impl Scene {
    fn from_uri(uri: &str) -> Self {
        match uri.trim_start_matches("stub://") {
            "walk-left" => Scene::WalkLeft,
            "walk-right" => Scene::WalkRight,
            _ => Scene::Static,
        }
    }
}

pub struct SyntheticSource {
    config: SourceConfig,
    scene: Scene,
    frame_count: u64,
    rng: StdRng,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> PipelineResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(PipelineError::device(
                config.uri.clone(),
                format!("invalid synthetic geometry {}x{}", config.width, config.height),
            ));
        }
        Ok(Self {
            scene: Scene::from_uri(&config.uri),
            config,
            frame_count: 0,
            rng: StdRng::seed_from_u64(NOISE_SEED),
            connected: false,
        })
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    /// Synthetic sources are always reachable.
    pub fn connect(&mut self) -> PipelineResult<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{}, {:?})",
            self.config.uri,
            self.config.width,
            self.config.height,
            self.scene
        );
        Ok(())
    }

    pub fn subject_width(&self) -> u32 {
        (self.config.width / 8).max(4)
    }

    pub fn subject_step(&self) -> i64 {
        (self.config.width as i64 / 50).max(1)
    }

    /// Left edge of the subject in frame `n` (1-based), possibly off-screen.
    pub fn subject_x(&self, n: u64) -> Option<i64> {
        let width = self.config.width as i64;
        let travelled = self.subject_step() * (n as i64 - 1);
        match self.scene {
            Scene::WalkLeft => Some(width - self.subject_width() as i64 - 20 - travelled),
            Scene::WalkRight => Some(20 + travelled),
            Scene::Static => None,
        }
    }

    fn render(&mut self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height * 3 {
            let jitter = self.rng.gen_range(-NOISE..=NOISE);
            pixels.push((BACKGROUND_LEVEL as i16 + jitter) as u8);
        }

        if let Some(x) = self.subject_x(self.frame_count) {
            let x0 = x.clamp(0, width as i64) as usize;
            let x1 = (x + self.subject_width() as i64).clamp(0, width as i64) as usize;
            let y0 = height / 3;
            let y1 = (y0 + (height / 3).max(4)).min(height);
            for y in y0..y1 {
                let row = y * width * 3;
                pixels[row + x0 * 3..row + x1 * 3].fill(SUBJECT_LEVEL);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
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
        self.frame_count += 1;
        let pixels = self.render();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            Channels::Rgb,
            Local::now(),
        )
    }

    fn close(&mut self) {
        if self.connected {
            log::info!(
                "SyntheticSource: closed {} after {} frames",
                self.config.uri,
                self.frame_count
            );
        }
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }
}
