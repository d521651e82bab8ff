//! Directional crossing classification.
//!
//! The frame is split into three vertical bands by two x thresholds:
//!
//! ```text
//!   Left  |      Dead      |  Right
//!  x < L  |  L <= x <= R   |  x > R
//! ```
//!
//! A subject first seen on the right and later seen on the left has crossed
//! leftwards (`Entry`); the mirror case is an `Exit`. Only the left edge of the
//! dominant region is considered, and the machine remembers a single pending
//! side between observations.

use std::time::Duration;

use chrono::{DateTime, Local};

use super::region::Region;
use super::motion::DEFAULT_MIN_CONTOUR_AREA;

pub const DEFAULT_LEFT_ZONE: u32 = 200;
pub const DEFAULT_CENTER_REFERENCE: u32 = 300;
pub const DEFAULT_RIGHT_ZONE: u32 = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossingConfig {
    pub left_zone: u32,
    /// Visual midline between the two zones. Not used for transitions.
    pub center_reference: u32,
    pub right_zone: u32,
    /// Regions must cover more pixels than this to drive a transition.
    pub min_area: u64,
    /// Reset a pending side that has not resolved within this long.
    /// `None` keeps it pending for the whole session.
    pub pending_timeout: Option<Duration>,
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self {
            left_zone: DEFAULT_LEFT_ZONE,
            center_reference: DEFAULT_CENTER_REFERENCE,
            right_zone: DEFAULT_RIGHT_ZONE,
            min_area: DEFAULT_MIN_CONTOUR_AREA,
            pending_timeout: None,
        }
    }
}

impl CrossingConfig {
    pub fn zone_of(&self, x: u32) -> Zone {
        if x > self.right_zone {
            Zone::Right
        } else if x < self.left_zone {
            Zone::Left
        } else {
            Zone::Dead
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    Left,
    Dead,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossingState {
    #[default]
    Idle,
    PendingLeft,
    PendingRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingKind {
    /// Right to left.
    Entry,
    /// Left to right.
    Exit,
}

/// One tracking session's crossing memory.
///
/// Created at session start and owned by whoever drives the loop. The state
/// returns to `Idle` as soon as an event is emitted, so one physical crossing
/// yields at most one event.
#[derive(Clone, Debug)]
pub struct CrossingStateMachine {
    config: CrossingConfig,
    state: CrossingState,
    pending_since: Option<DateTime<Local>>,
}

impl CrossingStateMachine {
    pub fn new(config: CrossingConfig) -> Self {
        Self {
            config,
            state: CrossingState::Idle,
            pending_since: None,
        }
    }

    pub fn state(&self) -> CrossingState {
        self.state
    }

    pub fn config(&self) -> &CrossingConfig {
        &self.config
    }

    /// Feed one motion region observed now.
    pub fn observe(&mut self, region: &Region) -> Option<CrossingKind> {
        self.observe_at(region, Local::now())
    }

    /// Feed one motion region observed at `at`.
    pub fn observe_at(&mut self, region: &Region, at: DateTime<Local>) -> Option<CrossingKind> {
        if region.area <= self.config.min_area {
            return None;
        }

        let zone = self.config.zone_of(region.x);
        match (self.state, zone) {
            (CrossingState::Idle, Zone::Right) => {
                self.enter(CrossingState::PendingRight, at);
                None
            }
            (CrossingState::Idle, Zone::Left) => {
                self.enter(CrossingState::PendingLeft, at);
                None
            }
            (CrossingState::PendingRight, Zone::Left) => {
                self.reset();
                Some(CrossingKind::Entry)
            }
            (CrossingState::PendingLeft, Zone::Right) => {
                self.reset();
                Some(CrossingKind::Exit)
            }
            _ => None,
        }
    }

    /// Drop a pending side older than the configured timeout.
    ///
    /// Returns true when the state was reset.
    pub fn expire(&mut self, now: DateTime<Local>) -> bool {
        let (Some(timeout), Some(since)) = (self.config.pending_timeout, self.pending_since) else {
            return false;
        };
        let waited = now.signed_duration_since(since).to_std().unwrap_or_default();
        if waited > timeout {
            log::debug!(
                "crossing: pending {:?} expired after {:.1}s",
                self.state,
                waited.as_secs_f64()
            );
            self.reset();
            return true;
        }
        false
    }

    /// Back to `Idle`, forgetting any pending side.
    pub fn reset(&mut self) {
        self.state = CrossingState::Idle;
        self.pending_since = None;
    }

    fn enter(&mut self, state: CrossingState, at: DateTime<Local>) {
        self.state = state;
        self.pending_since = Some(at);
    }
}
