use std::path::Path;

use watchpost::{
    track, CrossingState, EventSink, NeverStop, NullDisplay, OutputFormat, PipelineError,
    ReferenceStrategy, SourceConfig, TrackingConfig,
};

fn stub_source(scene: &str, max_frames: u64) -> SourceConfig {
    SourceConfig {
        uri: format!("stub://{scene}"),
        target_fps: 10,
        width: 640,
        height: 240,
        max_frames: Some(max_frames),
    }
}

fn unmirrored() -> TrackingConfig {
    TrackingConfig {
        mirror_frames: false,
        ..TrackingConfig::default()
    }
}

fn image_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn walker_moving_left_is_one_entry() {
    let out = tempfile::tempdir().expect("tempdir");
    let mut sink = EventSink::new(out.path(), OutputFormat::Png);

    let summary = track(
        &stub_source("walk-left", 80),
        &unmirrored(),
        &mut sink,
        &mut NullDisplay,
        &NeverStop,
    )
    .expect("tracking run");

    assert_eq!(summary.cycles, 40);
    assert_eq!((summary.entries, summary.exits), (1, 0));
    assert_eq!(summary.recorded.len(), 1);
    assert!(summary.write_failures.is_empty());
    assert!(summary.recorded[0].starts_with(out.path().join("visitors/in")));
    assert_eq!(image_count(&out.path().join("visitors/in")), 1);
    assert!(!out.path().join("visitors/out").exists());
}

#[test]
fn walker_moving_right_is_one_exit() {
    let out = tempfile::tempdir().expect("tempdir");
    let mut sink = EventSink::new(out.path(), OutputFormat::Png);

    let summary = track(
        &stub_source("walk-right", 80),
        &unmirrored(),
        &mut sink,
        &mut NullDisplay,
        &NeverStop,
    )
    .expect("tracking run");

    assert_eq!((summary.entries, summary.exits), (0, 1));
    assert_eq!(image_count(&out.path().join("visitors/out")), 1);
    assert!(!out.path().join("visitors/in").exists());
}

#[test]
fn mirroring_reverses_the_reported_direction() {
    let out = tempfile::tempdir().expect("tempdir");
    let mut sink = EventSink::new(out.path(), OutputFormat::Png);

    let summary = track(
        &stub_source("walk-left", 80),
        &TrackingConfig::default(),
        &mut sink,
        &mut NullDisplay,
        &NeverStop,
    )
    .expect("tracking run");

    assert_eq!((summary.entries, summary.exits), (0, 1));
}

#[test]
fn static_scene_records_nothing() {
    let out = tempfile::tempdir().expect("tempdir");
    let mut sink = EventSink::new(out.path(), OutputFormat::Png);
    let config = TrackingConfig {
        reference: ReferenceStrategy::Background { refresh_every: 5 },
        ..unmirrored()
    };

    let summary = track(
        &stub_source("static", 30),
        &config,
        &mut sink,
        &mut NullDisplay,
        &NeverStop,
    )
    .expect("tracking run");

    assert!(summary.cycles > 0);
    assert_eq!(summary.motion_cycles, 0);
    assert_eq!(summary.final_state, CrossingState::Idle);
    assert!(summary.recorded.is_empty());
    assert!(std::fs::read_dir(out.path()).expect("read out").next().is_none());
}

#[test]
fn unavailable_source_fails_before_tracking() {
    let out = tempfile::tempdir().expect("tempdir");
    let mut sink = EventSink::new(out.path(), OutputFormat::Png);
    let source = SourceConfig {
        uri: out.path().join("no-such-clip.mp4").to_string_lossy().into_owned(),
        ..SourceConfig::default()
    };

    let res = track(
        &source,
        &TrackingConfig::default(),
        &mut sink,
        &mut NullDisplay,
        &NeverStop,
    );
    assert!(matches!(res, Err(PipelineError::DeviceUnavailable { .. })));
}
