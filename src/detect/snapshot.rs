//! Point-in-time scene comparison for intrusion / tamper alerting.
//!
//! Unlike the crossing machine this is stateless: every call compares exactly
//! the two snapshots it is given.

use super::mask::{box_blur, DifferenceMask};
use super::region::Region;
use super::ssim::structural_similarity;
use crate::error::PipelineResult;
use crate::frame::Frame;

pub const DEFAULT_SIMILARITY_DIFF_THRESHOLD: u8 = 100;
pub const DEFAULT_MIN_CHANGE_AREA: u64 = 50;
pub const DEFAULT_SNAPSHOT_BLUR_KERNEL: u32 = 3;
pub const DEFAULT_SSIM_WINDOW: u32 = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Scaled similarity (0..=255) at or below which a pixel counts as changed.
    pub diff_threshold: u8,
    /// Changed components must cover more pixels than this.
    pub min_change_area: u64,
    pub blur_kernel: u32,
    pub window: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            diff_threshold: DEFAULT_SIMILARITY_DIFF_THRESHOLD,
            min_change_area: DEFAULT_MIN_CHANGE_AREA,
            blur_kernel: DEFAULT_SNAPSHOT_BLUR_KERNEL,
            window: DEFAULT_SSIM_WINDOW,
        }
    }
}

/// Outcome of comparing two snapshots.
#[derive(Clone, Debug)]
pub struct Comparison {
    /// Global similarity in [-1, 1]; 1 means identical.
    pub score: f64,
    /// Changed regions in discovery order.
    pub regions: Vec<Region>,
    pub mask: DifferenceMask,
}

impl Comparison {
    /// Any significant change is an intrusion candidate.
    pub fn is_intrusion(&self) -> bool {
        !self.regions.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SnapshotComparator {
    config: SnapshotConfig,
}

impl SnapshotComparator {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn compare(&self, current: &Frame, baseline: &Frame) -> PipelineResult<Comparison> {
        current.ensure_same_geometry(baseline)?;

        let a = box_blur(&current.to_luma(), self.config.blur_kernel);
        let b = box_blur(&baseline.to_luma(), self.config.blur_kernel);
        let map = structural_similarity(&a, &b, self.config.window);

        let mask = DifferenceMask::at_or_below(&map.to_intensity(), self.config.diff_threshold);
        let regions = mask
            .regions()
            .into_iter()
            .filter(|region| region.area > self.config.min_change_area)
            .collect();

        Ok(Comparison {
            score: map.score(),
            regions,
            mask,
        })
    }
}
