use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{CrossingConfig, MotionConfig, SnapshotConfig};
use crate::ingest::SourceConfig;
use crate::pipeline::{ReferenceStrategy, TrackingConfig};
use crate::storage::OutputFormat;

const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_BACKGROUND_REFRESH: u64 = 0;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WatchConfigFile {
    output_dir: Option<PathBuf>,
    image_format: Option<String>,
    source: Option<SourceConfigFile>,
    motion: Option<MotionConfigFile>,
    crossing: Option<CrossingConfigFile>,
    tracking: Option<TrackingConfigFile>,
    snapshot: Option<SnapshotConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    threshold: Option<u8>,
    min_contour_area: Option<u64>,
    blur_kernel: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CrossingConfigFile {
    left_zone: Option<u32>,
    center_reference: Option<u32>,
    right_zone: Option<u32>,
    min_area: Option<u64>,
    pending_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    /// `preceding` or `background`.
    reference: Option<String>,
    background_refresh: Option<u64>,
    mirror_frames: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    diff_threshold: Option<u8>,
    min_change_area: Option<u64>,
    blur_kernel: Option<u32>,
    window: Option<u32>,
}

/// Resolved settings shared by the `watchd` and `spot_diff` binaries.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Base directory for `visitors/in`, `visitors/out` and `stolen`.
    pub output_dir: PathBuf,
    pub image_format: OutputFormat,
    pub source: SourceConfig,
    pub tracking: TrackingConfig,
    pub snapshot: SnapshotConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            image_format: OutputFormat::default(),
            source: SourceConfig::default(),
            tracking: TrackingConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Defaults, then the file named by `WATCHPOST_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WATCHPOST_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Same layering as `load`, with an explicit config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let image_format = match file.image_format.as_deref() {
            Some(name) => OutputFormat::parse(name)
                .ok_or_else(|| anyhow!("unsupported image_format {:?} (jpeg or png)", name))?,
            None => defaults.image_format,
        };

        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            uri: source_file.uri.unwrap_or(defaults.source.uri),
            target_fps: source_file.target_fps.unwrap_or(defaults.source.target_fps),
            width: source_file.width.unwrap_or(defaults.source.width),
            height: source_file.height.unwrap_or(defaults.source.height),
            max_frames: source_file.max_frames.or(defaults.source.max_frames),
        };

        let motion_file = file.motion.unwrap_or_default();
        let default_motion = defaults.tracking.motion;
        let motion = MotionConfig {
            threshold: motion_file.threshold.unwrap_or(default_motion.threshold),
            min_contour_area: motion_file
                .min_contour_area
                .unwrap_or(default_motion.min_contour_area),
            blur_kernel: motion_file.blur_kernel.unwrap_or(default_motion.blur_kernel),
        };

        let crossing_file = file.crossing.unwrap_or_default();
        let default_crossing = defaults.tracking.crossing;
        let crossing = CrossingConfig {
            left_zone: crossing_file.left_zone.unwrap_or(default_crossing.left_zone),
            center_reference: crossing_file
                .center_reference
                .unwrap_or(default_crossing.center_reference),
            right_zone: crossing_file.right_zone.unwrap_or(default_crossing.right_zone),
            // Follows the contour minimum unless set on its own.
            min_area: crossing_file.min_area.unwrap_or(motion.min_contour_area),
            // 0 disables the timeout, same as the env override.
            pending_timeout: match crossing_file.pending_timeout_secs {
                Some(0) => None,
                Some(seconds) => Some(Duration::from_secs(seconds)),
                None => default_crossing.pending_timeout,
            },
        };

        let tracking_file = file.tracking.unwrap_or_default();
        let refresh_every = tracking_file
            .background_refresh
            .unwrap_or(DEFAULT_BACKGROUND_REFRESH);
        let reference = match tracking_file.reference.as_deref() {
            Some(name) => parse_reference(name, refresh_every)?,
            None => defaults.tracking.reference,
        };
        let tracking = TrackingConfig {
            motion,
            crossing,
            reference,
            mirror_frames: tracking_file
                .mirror_frames
                .unwrap_or(defaults.tracking.mirror_frames),
        };

        let snapshot_file = file.snapshot.unwrap_or_default();
        let snapshot = SnapshotConfig {
            diff_threshold: snapshot_file
                .diff_threshold
                .unwrap_or(defaults.snapshot.diff_threshold),
            min_change_area: snapshot_file
                .min_change_area
                .unwrap_or(defaults.snapshot.min_change_area),
            blur_kernel: snapshot_file
                .blur_kernel
                .unwrap_or(defaults.snapshot.blur_kernel),
            window: snapshot_file.window.unwrap_or(defaults.snapshot.window),
        };

        Ok(Self {
            output_dir: file.output_dir.unwrap_or(defaults.output_dir),
            image_format,
            source,
            tracking,
            snapshot,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("WATCHPOST_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var("WATCHPOST_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Some(left) = env_number("WATCHPOST_LEFT_ZONE")? {
            self.tracking.crossing.left_zone = left;
        }
        if let Some(right) = env_number("WATCHPOST_RIGHT_ZONE")? {
            self.tracking.crossing.right_zone = right;
        }
        if let Some(threshold) = env_number("WATCHPOST_MOTION_THRESHOLD")? {
            self.tracking.motion.threshold = threshold;
        }
        if let Some(area) = env_number::<u64>("WATCHPOST_MIN_CONTOUR_AREA")? {
            if self.tracking.crossing.min_area == self.tracking.motion.min_contour_area {
                self.tracking.crossing.min_area = area;
            }
            self.tracking.motion.min_contour_area = area;
        }
        if let Some(seconds) = env_number::<u64>("WATCHPOST_PENDING_TIMEOUT_SECS")? {
            self.tracking.crossing.pending_timeout =
                (seconds > 0).then(|| Duration::from_secs(seconds));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }

        let crossing = &self.tracking.crossing;
        if crossing.left_zone >= crossing.right_zone {
            return Err(anyhow!(
                "left_zone ({}) must be less than right_zone ({})",
                crossing.left_zone,
                crossing.right_zone
            ));
        }
        if crossing.center_reference <= crossing.left_zone
            || crossing.center_reference >= crossing.right_zone
        {
            return Err(anyhow!(
                "center_reference ({}) must lie strictly between left_zone ({}) and right_zone ({})",
                crossing.center_reference,
                crossing.left_zone,
                crossing.right_zone
            ));
        }

        if self.tracking.motion.threshold == 0 {
            return Err(anyhow!("motion threshold must be greater than zero"));
        }
        if self.snapshot.diff_threshold == 0 {
            return Err(anyhow!("snapshot diff_threshold must be greater than zero"));
        }
        ensure_odd("motion blur_kernel", self.tracking.motion.blur_kernel, 1)?;
        ensure_odd("snapshot blur_kernel", self.snapshot.blur_kernel, 1)?;
        ensure_odd("snapshot window", self.snapshot.window, 3)?;
        Ok(())
    }
}

fn parse_reference(name: &str, refresh_every: u64) -> Result<ReferenceStrategy> {
    match name.trim().to_ascii_lowercase().as_str() {
        "preceding" | "preceding_frame" => Ok(ReferenceStrategy::PrecedingFrame),
        "background" => Ok(ReferenceStrategy::Background { refresh_every }),
        other => Err(anyhow!(
            "unknown tracking reference {:?} (preceding or background)",
            other
        )),
    }
}

fn ensure_odd(name: &str, value: u32, min: u32) -> Result<()> {
    if value < min || value % 2 == 0 {
        return Err(anyhow!("{} must be an odd number >= {}, got {}", name, min, value));
    }
    Ok(())
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer, got {:?}", key, raw)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: WatchConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_resolves_to_defaults() -> Result<()> {
        let cfg = WatchConfig::from_file(WatchConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.tracking, TrackingConfig::default());
        assert_eq!(cfg.snapshot, SnapshotConfig::default());
        assert_eq!(cfg.source, SourceConfig::default());
        assert_eq!(cfg.output_dir, PathBuf::from("."));
        assert_eq!(cfg.image_format, OutputFormat::Jpeg);
        Ok(())
    }

    #[test]
    fn crossing_min_area_follows_contour_minimum() -> Result<()> {
        let file: WatchConfigFile = serde_json::from_str(r#"{"motion": {"min_contour_area": 900}}"#)?;
        let cfg = WatchConfig::from_file(file)?;
        assert_eq!(cfg.tracking.crossing.min_area, 900);

        let file: WatchConfigFile = serde_json::from_str(
            r#"{"motion": {"min_contour_area": 900}, "crossing": {"min_area": 1200}}"#,
        )?;
        let cfg = WatchConfig::from_file(file)?;
        assert_eq!(cfg.tracking.crossing.min_area, 1200);
        Ok(())
    }

    #[test]
    fn validate_rejects_bad_geometry_and_kernels() -> Result<()> {
        let mut cfg = WatchConfig::default();
        cfg.tracking.crossing.left_zone = 500;
        cfg.tracking.crossing.right_zone = 200;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchConfig::default();
        cfg.tracking.crossing.center_reference = 600;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchConfig::default();
        cfg.tracking.motion.blur_kernel = 4;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchConfig::default();
        cfg.snapshot.window = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchConfig::default();
        cfg.tracking.motion.threshold = 0;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn unknown_reference_strategy_is_rejected() {
        let file: WatchConfigFile =
            serde_json::from_str(r#"{"tracking": {"reference": "median"}}"#).expect("parse");
        assert!(WatchConfig::from_file(file).is_err());
    }
}
