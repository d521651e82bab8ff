use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use watchpost::{
    compare_snapshots, AlertEmitter, EventSink, FrameInput, OutputFormat, SnapshotConfig,
};

#[derive(Default)]
struct CountingAlert {
    fired: u32,
}

impl AlertEmitter for CountingAlert {
    fn emit_alert(&mut self) {
        self.fired += 1;
    }
}

fn write_scene(dir: &Path, name: &str, with_object: bool) -> PathBuf {
    let mut img = RgbImage::from_pixel(200, 150, Rgb([10, 10, 10]));
    if with_object {
        for y in 50..110 {
            for x in 70..130 {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
    }
    let path = dir.join(name);
    img.save(&path).expect("save scene");
    path
}

#[test]
fn unchanged_scene_is_quiet() {
    let input = tempfile::tempdir().expect("input dir");
    let out = tempfile::tempdir().expect("output dir");
    let baseline = write_scene(input.path(), "baseline.png", false);
    let current = write_scene(input.path(), "current.png", false);

    let mut sink = EventSink::new(out.path(), OutputFormat::Png);
    let mut alert = CountingAlert::default();
    let outcome = compare_snapshots(
        FrameInput::Path(current),
        FrameInput::Path(baseline),
        &SnapshotConfig::default(),
        &mut sink,
        &mut alert,
    )
    .expect("compare");

    assert!(!outcome.is_intrusion());
    assert!((outcome.comparison.score - 1.0).abs() < 1e-9);
    assert_eq!(alert.fired, 0);
    assert!(!out.path().join("stolen").exists());
}

#[test]
fn changed_scene_alerts_and_saves_to_stolen() {
    let input = tempfile::tempdir().expect("input dir");
    let out = tempfile::tempdir().expect("output dir");
    let baseline = write_scene(input.path(), "baseline.png", true);
    let current = write_scene(input.path(), "current.png", false);

    let mut sink = EventSink::new(out.path(), OutputFormat::Png);
    let mut alert = CountingAlert::default();
    let outcome = compare_snapshots(
        FrameInput::Path(current),
        FrameInput::Path(baseline),
        &SnapshotConfig::default(),
        &mut sink,
        &mut alert,
    )
    .expect("compare");

    assert!(outcome.is_intrusion());
    assert!(outcome.comparison.score < 1.0);
    assert_eq!(alert.fired, 1);

    let region = outcome.comparison.regions[0];
    assert!(region.x <= 70 && region.right() >= 130);
    assert!(region.y <= 50 && region.bottom() >= 110);

    let saved = match outcome.persisted {
        Some(Ok(path)) => path,
        other => panic!("expected a saved intrusion image, got {:?}", other),
    };
    assert!(saved.starts_with(out.path().join("stolen")));
    let stored = image::open(&saved).expect("decode saved").to_rgb8();
    assert_eq!(stored.dimensions(), (200, 150));
}

#[test]
fn undecodable_snapshot_is_an_error() {
    let input = tempfile::tempdir().expect("input dir");
    let out = tempfile::tempdir().expect("output dir");
    let baseline = write_scene(input.path(), "baseline.png", false);
    let broken = input.path().join("broken.png");
    std::fs::write(&broken, b"not an image").expect("write broken");

    let mut sink = EventSink::new(out.path(), OutputFormat::Png);
    let res = compare_snapshots(
        FrameInput::Path(broken),
        FrameInput::Path(baseline),
        &SnapshotConfig::default(),
        &mut sink,
        &mut CountingAlert::default(),
    );
    assert!(matches!(res, Err(watchpost::PipelineError::InvalidFrame(_))));
}

#[test]
fn empty_snapshots_are_an_error() {
    let out = tempfile::tempdir().expect("output dir");
    let empty = || FrameInput::Image {
        image: image::DynamicImage::ImageRgb8(RgbImage::new(0, 0)),
        captured_at: chrono::Local::now(),
    };

    let mut sink = EventSink::new(out.path(), OutputFormat::Png);
    let mut alert = CountingAlert::default();
    let res = compare_snapshots(
        empty(),
        empty(),
        &SnapshotConfig::default(),
        &mut sink,
        &mut alert,
    );
    assert!(matches!(res, Err(watchpost::PipelineError::InvalidFrame(_))));
    assert_eq!(alert.fired, 0);
}
