mod crossing;
mod mask;
mod motion;
mod region;
mod snapshot;
mod ssim;

pub use crossing::{
    CrossingConfig, CrossingKind, CrossingState, CrossingStateMachine, Zone,
    DEFAULT_CENTER_REFERENCE, DEFAULT_LEFT_ZONE, DEFAULT_RIGHT_ZONE,
};
pub use mask::DifferenceMask;
pub use motion::{
    MotionConfig, MotionExtractor, DEFAULT_MIN_CONTOUR_AREA, DEFAULT_MOTION_BLUR_KERNEL,
    DEFAULT_MOTION_THRESHOLD,
};
pub use region::Region;
pub use snapshot::{
    Comparison, SnapshotComparator, SnapshotConfig, DEFAULT_MIN_CHANGE_AREA,
    DEFAULT_SIMILARITY_DIFF_THRESHOLD, DEFAULT_SNAPSHOT_BLUR_KERNEL, DEFAULT_SSIM_WINDOW,
};
pub use ssim::{structural_similarity, SsimMap};
