//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - Synthetic scenes (`stub://walk-left`, `stub://walk-right`, `stub://static`)
//! - Directories of still images, read in filename order
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Every source yields frames in arrival order and buffers at most one frame.
//! Opening fails with `DeviceUnavailable`; running out of frames (end of file,
//! unplugged device, frame limit) is reported as `StreamExhausted`.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod stub;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::ops::{Deref, DerefMut};
use std::path::Path;

pub use file::ImageSequenceSource;
pub use stub::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

pub const DEFAULT_SOURCE_URI: &str = "/dev/video0";
pub const DEFAULT_TARGET_FPS: u32 = 10;
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Where frames come from and how they should be shaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    /// `stub://<scene>`, `/dev/videoN`, an image directory, or a video file.
    pub uri: String,
    pub target_fps: u32,
    /// Requested frame width (synthetic and V4L2 sources).
    pub width: u32,
    /// Requested frame height (synthetic and V4L2 sources).
    pub height: u32,
    /// Stop with `StreamExhausted` after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_SOURCE_URI.to_string(),
            target_fps: DEFAULT_TARGET_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            max_frames: None,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}

/// A sequential frame producer that owns its capture handle.
pub trait FrameSource {
    /// Next frame in arrival order.
    fn next_frame(&mut self) -> PipelineResult<Frame>;

    /// Release the capture handle. Calling it twice is harmless.
    fn close(&mut self);

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> PipelineResult<Frame> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Scoped ownership of an open source: the handle is closed when the guard drops,
/// whichever way the owning scope is left.
pub struct SourceGuard<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: FrameSource> Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// Open and connect the source named by `config.uri`.
pub fn open_source(config: &SourceConfig) -> PipelineResult<SourceGuard<Box<dyn FrameSource>>> {
    let uri = config.uri.trim();
    if uri.is_empty() {
        return Err(PipelineError::device(uri, "empty source uri"));
    }

    let source: Box<dyn FrameSource> = if uri.starts_with("stub://") {
        let mut source = SyntheticSource::new(config.clone())?;
        source.connect()?;
        Box::new(source)
    } else if uri.contains("://") {
        return Err(PipelineError::device(
            uri,
            "only local sources are supported (no URL schemes)",
        ));
    } else if uri.starts_with("/dev/video") {
        open_device(config)?
    } else if Path::new(uri).is_dir() {
        let mut source = ImageSequenceSource::new(config.clone())?;
        source.connect()?;
        Box::new(source)
    } else {
        open_video_file(config)?
    };

    Ok(SourceGuard::new(source))
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(config: &SourceConfig) -> PipelineResult<Box<dyn FrameSource>> {
    let mut source = V4l2Source::new(config.clone());
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(config: &SourceConfig) -> PipelineResult<Box<dyn FrameSource>> {
    Err(PipelineError::device(
        config.uri.clone(),
        "capture devices require the ingest-v4l2 feature",
    ))
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_video_file(config: &SourceConfig) -> PipelineResult<Box<dyn FrameSource>> {
    let mut source = file_ffmpeg::FfmpegFileSource::new(config.clone())?;
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_video_file(config: &SourceConfig) -> PipelineResult<Box<dyn FrameSource>> {
    if !Path::new(config.uri.trim()).exists() {
        return Err(PipelineError::device(config.uri.clone(), "no such file or directory"));
    }
    Err(PipelineError::device(
        config.uri.clone(),
        "video files require the ingest-file-ffmpeg feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSource {
        closed: Rc<Cell<u32>>,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> PipelineResult<Frame> {
            Err(PipelineError::StreamExhausted)
        }

        fn close(&mut self) {
            self.closed.set(self.closed.get() + 1);
        }

        fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: 0,
                uri: "counting".to_string(),
            }
        }
    }

    fn read_until_exhausted(source: &mut dyn FrameSource) -> PipelineResult<()> {
        source.next_frame()?;
        Ok(())
    }

    #[test]
    fn guard_closes_on_early_return() {
        let closed = Rc::new(Cell::new(0));
        {
            let mut guard = SourceGuard::new(CountingSource {
                closed: Rc::clone(&closed),
            });
            assert!(read_until_exhausted(&mut *guard).is_err());
        }
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn url_schemes_are_rejected() {
        let config = SourceConfig {
            uri: "rtsp://camera/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            open_source(&config),
            Err(PipelineError::DeviceUnavailable { .. })
        ));
    }

    #[test]
    fn missing_paths_are_unavailable() {
        let config = SourceConfig {
            uri: "/nonexistent/watchpost/clip.mp4".to_string(),
            ..SourceConfig::default()
        };
        assert!(matches!(
            open_source(&config),
            Err(PipelineError::DeviceUnavailable { .. })
        ));
    }

    #[test]
    fn stub_uri_opens_synthetic_source() -> PipelineResult<()> {
        let config = SourceConfig {
            uri: "stub://static".to_string(),
            width: 64,
            height: 48,
            ..SourceConfig::default()
        };
        let mut source = open_source(&config)?;
        let frame = source.next_frame()?;
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert_eq!(source.stats().frames_captured, 1);
        Ok(())
    }
}
