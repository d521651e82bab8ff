//! The two use cases as callable entry points.
//!
//! - `run_tracking`: continuous motion tracking that records entries and exits.
//! - `compare_snapshots`: one-shot structural comparison that records intrusions.
//!
//! One tracking cycle is: acquire, extract, update crossing state, persist,
//! display, poll the stop signal. Nothing here spawns threads.

use std::path::PathBuf;
use std::time::Duration;

use crate::detect::{
    Comparison, CrossingConfig, CrossingKind, CrossingState, CrossingStateMachine, MotionConfig,
    MotionExtractor, Region, SnapshotComparator, SnapshotConfig,
};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, FrameInput};
use crate::ingest::{open_source, FrameSource, SourceConfig};
use crate::overlay;
use crate::storage::EventStore;
use crate::ui::{AlertEmitter, FrameDisplay, StopSignal};
use crate::{Event, EventKind};

/// Cycles between source health log lines.
const HEALTH_LOG_EVERY: u64 = 100;

/// What each frame is differenced against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferenceStrategy {
    /// Read two consecutive frames per cycle and difference them.
    #[default]
    PrecedingFrame,
    /// Difference one frame per cycle against a stored background snapshot,
    /// re-captured every `refresh_every` cycles (0 keeps the first one).
    Background { refresh_every: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackingConfig {
    pub motion: MotionConfig,
    pub crossing: CrossingConfig,
    pub reference: ReferenceStrategy,
    /// Flip frames horizontally before detection, as a front-facing camera is viewed.
    pub mirror_frames: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            motion: MotionConfig::default(),
            crossing: CrossingConfig::default(),
            reference: ReferenceStrategy::default(),
            mirror_frames: true,
        }
    }
}

/// What a tracking session did before it ended.
#[derive(Debug)]
pub struct TrackingSummary {
    pub cycles: u64,
    /// Cycles that produced a motion region above the contour minimum.
    pub motion_cycles: u64,
    pub entries: u64,
    pub exits: u64,
    /// Paths of every event image written.
    pub recorded: Vec<PathBuf>,
    /// Events that were detected but could not be persisted.
    pub write_failures: Vec<PipelineError>,
    pub final_state: CrossingState,
}

impl TrackingSummary {
    fn new() -> Self {
        Self {
            cycles: 0,
            motion_cycles: 0,
            entries: 0,
            exits: 0,
            recorded: Vec::new(),
            write_failures: Vec::new(),
            final_state: CrossingState::Idle,
        }
    }
}

/// Supplies (reference, current) pairs according to a `ReferenceStrategy`.
struct ReferenceFeed {
    strategy: ReferenceStrategy,
    mirror: bool,
    background: Option<Frame>,
    background_age: u64,
}

impl ReferenceFeed {
    fn new(config: &TrackingConfig) -> Self {
        Self {
            strategy: config.reference,
            mirror: config.mirror_frames,
            background: None,
            background_age: 0,
        }
    }

    fn read(&self, source: &mut dyn FrameSource) -> PipelineResult<Frame> {
        let frame = source.next_frame()?;
        Ok(if self.mirror { frame.mirrored() } else { frame })
    }

    fn next_pair(&mut self, source: &mut dyn FrameSource) -> PipelineResult<(Frame, Frame)> {
        match self.strategy {
            ReferenceStrategy::PrecedingFrame => {
                let reference = self.read(source)?;
                let current = self.read(source)?;
                Ok((reference, current))
            }
            ReferenceStrategy::Background { refresh_every } => {
                let stale = refresh_every > 0 && self.background_age >= refresh_every;
                let background = match self.background.take() {
                    Some(frame) if !stale => frame,
                    _ => {
                        log::debug!("tracking: capturing background reference");
                        self.background_age = 0;
                        self.read(source)?
                    }
                };
                let current = self.read(source);
                self.background_age += 1;
                let reference = background.clone();
                self.background = Some(background);
                Ok((reference, current?))
            }
        }
    }
}

/// Run the tracking loop until the stream ends or a stop is requested.
///
/// `DeviceUnavailable` and frame errors end the session with `Err`. Failed
/// event writes are logged, collected in the summary and do not stop the loop.
pub fn run_tracking(
    source: &mut dyn FrameSource,
    config: &TrackingConfig,
    store: &mut dyn EventStore,
    display: &mut dyn FrameDisplay,
    stop: &dyn StopSignal,
) -> PipelineResult<TrackingSummary> {
    let extractor = MotionExtractor::new(config.motion.clone());
    let mut machine = CrossingStateMachine::new(config.crossing.clone());
    let mut feed = ReferenceFeed::new(config);
    let mut summary = TrackingSummary::new();

    loop {
        let (reference, current) = match feed.next_pair(source) {
            Ok(pair) => pair,
            Err(PipelineError::StreamExhausted) => {
                log::info!("tracking: stream exhausted after {} cycles", summary.cycles);
                break;
            }
            Err(e) => return Err(e),
        };
        summary.cycles += 1;
        machine.expire(current.captured_at());

        let region = extractor.extract(&reference, &current)?;
        if let Some(region) = region {
            summary.motion_cycles += 1;
            if let Some(kind) = machine.observe_at(&region, current.captured_at()) {
                record_crossing(kind, &current, region, store, &mut summary);
            }
        }

        let shown: Vec<Region> = region.into_iter().collect();
        display.show(&current, &shown);

        if summary.cycles % HEALTH_LOG_EVERY == 0 {
            let stats = source.stats();
            log::info!(
                "tracking: {} cycles, {} frames from {}, healthy={}, state={:?}",
                summary.cycles,
                stats.frames_captured,
                stats.uri,
                source.is_healthy(),
                machine.state()
            );
        }

        if stop.stop_requested() {
            log::info!("tracking: stop requested after {} cycles", summary.cycles);
            break;
        }
    }

    summary.final_state = machine.state();
    Ok(summary)
}

fn record_crossing(
    kind: CrossingKind,
    frame: &Frame,
    region: Region,
    store: &mut dyn EventStore,
    summary: &mut TrackingSummary,
) {
    match kind {
        CrossingKind::Entry => summary.entries += 1,
        CrossingKind::Exit => summary.exits += 1,
    }
    let kind = EventKind::from(kind);
    log::info!(
        "{} detected at x={} (area {})",
        kind.as_str(),
        region.x,
        region.area
    );

    let event = Event::new(kind, overlay::annotate(frame, &[region]), vec![region]);
    match store.record(&event) {
        Ok(path) => summary.recorded.push(path),
        Err(e) => {
            log::error!("{} event lost: {}", kind.as_str(), e);
            summary.write_failures.push(e);
        }
    }
}

/// Open `source_config`, track until done, and release the source on every path.
pub fn track(
    source_config: &SourceConfig,
    config: &TrackingConfig,
    store: &mut dyn EventStore,
    display: &mut dyn FrameDisplay,
    stop: &dyn StopSignal,
) -> PipelineResult<TrackingSummary> {
    let mut source = open_source(source_config)?;
    run_tracking(&mut **source, config, store, display, stop)
}

/// Result of one snapshot comparison.
#[derive(Debug)]
pub struct SnapshotOutcome {
    pub comparison: Comparison,
    /// Set when an intrusion was detected: where the annotated frame went, or why it did not.
    pub persisted: Option<PipelineResult<PathBuf>>,
}

impl SnapshotOutcome {
    pub fn is_intrusion(&self) -> bool {
        self.comparison.is_intrusion()
    }
}

/// Compare `current` against `baseline`. On any significant change, alert once
/// and persist the annotated current frame as an intrusion.
pub fn compare_snapshots(
    current: FrameInput,
    baseline: FrameInput,
    config: &SnapshotConfig,
    store: &mut dyn EventStore,
    alert: &mut dyn AlertEmitter,
) -> PipelineResult<SnapshotOutcome> {
    let current = current.normalize()?;
    let baseline = baseline.normalize()?;
    let comparison = SnapshotComparator::new(config.clone()).compare(&current, &baseline)?;
    log::info!(
        "snapshot similarity {:.4}, {} changed regions",
        comparison.score,
        comparison.regions.len()
    );

    if !comparison.is_intrusion() {
        return Ok(SnapshotOutcome {
            comparison,
            persisted: None,
        });
    }

    log::warn!("intrusion: scene changed in {} regions", comparison.regions.len());
    alert.emit_alert();
    let event = Event::new(
        EventKind::Intrusion,
        overlay::annotate(&current, &comparison.regions),
        comparison.regions.clone(),
    );
    let persisted = store.record(&event);
    if let Err(e) = &persisted {
        log::error!("intrusion event lost: {}", e);
    }
    Ok(SnapshotOutcome {
        comparison,
        persisted: Some(persisted),
    })
}

/// Take a baseline frame, wait `delay`, take the current frame.
///
/// Returns `(baseline, current)`.
pub fn capture_snapshot_pair(
    source: &mut dyn FrameSource,
    delay: Duration,
    mirror: bool,
) -> PipelineResult<(Frame, Frame)> {
    let flip = |frame: Frame| if mirror { frame.mirrored() } else { frame };
    let baseline = flip(source.next_frame()?);
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
    let current = flip(source.next_frame()?);
    Ok((baseline, current))
}
