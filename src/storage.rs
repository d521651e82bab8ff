use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{PipelineError, PipelineResult};
use crate::{Event, EventKind};

/// Sortable, second-resolution filename stem.
const FILENAME_PATTERN: &str = "%Y-%m-%d-%H-%M-%S";

pub trait EventStore {
    /// Persist the event's frame and return where it was written.
    fn record(&mut self, event: &Event) -> PipelineResult<PathBuf>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

/// Flat, kind-keyed image directories under one base directory:
///
/// ```text
/// <base>/visitors/in/2024-05-01-17-03-22.jpg
/// <base>/visitors/out/...
/// <base>/stolen/...
/// ```
///
/// Directories are created on first write. Two events of the same kind within
/// one second share a filename and the later one wins.
#[derive(Clone, Debug)]
pub struct EventSink {
    base_dir: PathBuf,
    format: OutputFormat,
}

impl EventSink {
    pub fn new(base_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            base_dir: base_dir.into(),
            format,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where an event of `kind` stamped `timestamp` would be written.
    pub fn path_for(&self, kind: EventKind, timestamp: DateTime<Local>) -> PathBuf {
        self.base_dir.join(kind.directory()).join(format!(
            "{}.{}",
            timestamp.format(FILENAME_PATTERN),
            self.format.extension()
        ))
    }
}

impl EventStore for EventSink {
    fn record(&mut self, event: &Event) -> PipelineResult<PathBuf> {
        let path = self.path_for(event.kind(), event.timestamp());
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| PipelineError::write(dir, e))?;
        }
        event
            .frame()
            .to_rgb()
            .save_with_format(&path, self.format.image_format())
            .map_err(|e| PipelineError::write(&path, e))?;
        log::info!(
            "saved {} image: {}",
            event.kind().as_str(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use chrono::TimeZone;
    use image::{Rgb, RgbImage};

    fn solid(value: u8, at: DateTime<Local>) -> Frame {
        Frame::from_rgb_image(RgbImage::from_pixel(16, 8, Rgb([value, value, value])), at)
    }

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 1, 17, 3, 22)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn filenames_follow_kind_and_timestamp() {
        let sink = EventSink::new("/srv/watch", OutputFormat::Jpeg);
        assert_eq!(
            sink.path_for(EventKind::Entry, fixed_time()),
            PathBuf::from("/srv/watch/visitors/in/2024-05-01-17-03-22.jpg")
        );
        assert_eq!(
            sink.path_for(EventKind::Intrusion, fixed_time()),
            PathBuf::from("/srv/watch/stolen/2024-05-01-17-03-22.jpg")
        );
    }

    #[test]
    fn record_creates_directories_lazily() -> PipelineResult<()> {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = EventSink::new(dir.path(), OutputFormat::Png);
        assert!(!dir.path().join("visitors").exists());

        let at = fixed_time();
        let path = sink.record(&Event::new(EventKind::Exit, solid(90, at), vec![]))?;
        assert_eq!(path, dir.path().join("visitors/out/2024-05-01-17-03-22.png"));
        assert!(path.is_file());
        assert!(!dir.path().join("stolen").exists());
        Ok(())
    }

    #[test]
    fn same_second_writes_overwrite() -> PipelineResult<()> {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = EventSink::new(dir.path(), OutputFormat::Png);
        let at = fixed_time();

        let first = sink.record(&Event::new(EventKind::Entry, solid(10, at), vec![]))?;
        let second = sink.record(&Event::new(
            EventKind::Entry,
            solid(200, at + chrono::Duration::milliseconds(400)),
            vec![],
        ))?;
        assert_eq!(first, second);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("visitors/in"))
            .expect("read dir")
            .collect();
        assert_eq!(files.len(), 1);
        let stored = image::open(&second).expect("decode").to_rgb8();
        assert!(stored.pixels().all(|p| *p == Rgb([200, 200, 200])));
        Ok(())
    }

    #[test]
    fn unwritable_base_reports_io_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").expect("write blocker");

        let mut sink = EventSink::new(&blocker, OutputFormat::Jpeg);
        let res = sink.record(&Event::new(EventKind::Intrusion, solid(1, fixed_time()), vec![]));
        assert!(matches!(res, Err(PipelineError::IoWriteFailure { .. })));
    }

    #[test]
    fn output_format_parses_common_names() {
        assert_eq!(OutputFormat::parse("JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::parse("png"), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::parse("gif"), None);
    }
}
