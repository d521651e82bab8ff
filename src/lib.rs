//! Watchpost visual event detection kernel
//!
//! This crate turns camera frames into a small set of security events:
//!
//! 1. **Entry / Exit**: a single dominant moving subject crosses the frame
//!    right-to-left or left-to-right through fixed horizontal zones.
//! 2. **Intrusion**: two snapshots of the same scene differ structurally.
//!
//! # Module Structure
//!
//! - `frame`: canonical frame type and the ingestion-boundary `FrameInput`
//! - `ingest`: frame sources (synthetic, image sequence, V4L2, video file)
//! - `detect`: motion extraction, crossing state machine, snapshot comparison
//! - `storage`: event persistence to kind-keyed directories
//! - `overlay`: bounding-box and zone annotations on frames
//! - `ui`: display / alert / stop-signal collaborators
//! - `pipeline`: the tracking loop and the one-shot comparison entry points
//! - `config`: file + environment configuration
//!
//! Everything runs on the caller's thread. The only long-lived resource is the
//! capture handle, which is released by `ingest::SourceGuard` on every exit path.

use chrono::{DateTime, Local};

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod storage;
pub mod ui;

pub use detect::{
    Comparison, CrossingConfig, CrossingKind, CrossingState, CrossingStateMachine,
    DifferenceMask, MotionConfig, MotionExtractor, Region, SnapshotComparator, SnapshotConfig,
    Zone,
};
pub use error::{PipelineError, PipelineResult};
pub use frame::{Channels, Frame, FrameInput};
pub use ingest::{open_source, FrameSource, SourceConfig, SourceGuard};
pub use pipeline::{
    compare_snapshots, run_tracking, track, ReferenceStrategy, SnapshotOutcome, TrackingConfig,
    TrackingSummary,
};
pub use storage::{EventSink, EventStore, OutputFormat};
pub use ui::{AlertEmitter, CtrlCStop, FrameDisplay, NeverStop, NullDisplay, SilentAlert, StopSignal};

// -------------------- Events --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Entry,
    Exit,
    Intrusion,
}

impl EventKind {
    /// Output subdirectory, relative to the sink's base directory.
    pub fn directory(self) -> &'static str {
        match self {
            EventKind::Entry => "visitors/in",
            EventKind::Exit => "visitors/out",
            EventKind::Intrusion => "stolen",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Entry => "entry",
            EventKind::Exit => "exit",
            EventKind::Intrusion => "intrusion",
        }
    }
}

impl From<CrossingKind> for EventKind {
    fn from(kind: CrossingKind) -> Self {
        match kind {
            CrossingKind::Entry => EventKind::Entry,
            CrossingKind::Exit => EventKind::Exit,
        }
    }
}

/// A detected event and the frame that evidences it. Immutable once built.
///
/// Crossing events carry the single region that completed the crossing;
/// intrusion events carry every changed region.
#[derive(Clone, Debug)]
pub struct Event {
    kind: EventKind,
    timestamp: DateTime<Local>,
    frame: Frame,
    regions: Vec<Region>,
}

impl Event {
    /// Event stamped with the frame's capture time.
    pub fn new(kind: EventKind, frame: Frame, regions: Vec<Region>) -> Self {
        Self {
            kind,
            timestamp: frame.captured_at(),
            frame,
            regions,
        }
    }

    pub fn with_timestamp(
        kind: EventKind,
        timestamp: DateTime<Local>,
        frame: Frame,
        regions: Vec<Region>,
    ) -> Self {
        Self {
            kind,
            timestamp,
            frame,
            regions,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}
