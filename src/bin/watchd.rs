//! watchd - continuous entry/exit tracking
//!
//! This daemon:
//! 1. Opens the configured frame source (camera, video file, image directory, stub)
//! 2. Differences frames to find the dominant moving subject
//! 3. Classifies right-to-left crossings as entries and left-to-right as exits
//! 4. Saves an annotated frame per event under visitors/in and visitors/out
//! 5. Stops cleanly at end of stream or on Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use watchpost::config::WatchConfig;
use watchpost::ui::PreviewFileDisplay;
use watchpost::{
    track, CtrlCStop, EventSink, FrameDisplay, NullDisplay, OutputFormat, ReferenceStrategy,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track entries and exits through a camera's field of view")]
struct Args {
    /// JSON or TOML config file (defaults to $WATCHPOST_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame source: /dev/videoN, a video file, an image directory, or stub://<scene>.
    #[arg(long)]
    source: Option<String>,

    /// Base directory for visitors/in and visitors/out.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Saved image format (jpeg or png).
    #[arg(long)]
    format: Option<String>,

    /// Stop after this many source frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Difference against a background snapshot refreshed every N cycles (0 = never).
    #[arg(long)]
    background_refresh: Option<u64>,

    /// Do not mirror frames horizontally before detection.
    #[arg(long)]
    no_mirror: bool,

    /// Write an annotated preview image to this path while running.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Refresh the preview every N cycles.
    #[arg(long, default_value = "10")]
    preview_every: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match args.config.as_deref() {
        Some(path) => WatchConfig::load_from(Some(path))?,
        None => WatchConfig::load()?,
    };
    if let Some(source) = args.source {
        cfg.source.uri = source;
    }
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    if let Some(name) = args.format.as_deref() {
        cfg.image_format = OutputFormat::parse(name)
            .ok_or_else(|| anyhow!("unsupported --format {:?} (jpeg or png)", name))?;
    }
    if args.max_frames.is_some() {
        cfg.source.max_frames = args.max_frames;
    }
    if let Some(refresh_every) = args.background_refresh {
        cfg.tracking.reference = ReferenceStrategy::Background { refresh_every };
    }
    if args.no_mirror {
        cfg.tracking.mirror_frames = false;
    }

    log::info!(
        "watchd {} tracking {} (zones {} / {} / {}), saving to {}",
        env!("CARGO_PKG_VERSION"),
        cfg.source.uri,
        cfg.tracking.crossing.left_zone,
        cfg.tracking.crossing.center_reference,
        cfg.tracking.crossing.right_zone,
        cfg.output_dir.display()
    );

    let stop = CtrlCStop::install()?;
    let mut sink = EventSink::new(&cfg.output_dir, cfg.image_format);
    let mut display: Box<dyn FrameDisplay> = match args.preview {
        Some(path) => Box::new(
            PreviewFileDisplay::new(path, args.preview_every)
                .with_zones(cfg.tracking.crossing.clone()),
        ),
        None => Box::new(NullDisplay),
    };

    let summary = track(&cfg.source, &cfg.tracking, &mut sink, display.as_mut(), &stop)?;

    log::info!(
        "watchd: {} cycles, {} with motion, {} entries, {} exits, final state {:?}",
        summary.cycles,
        summary.motion_cycles,
        summary.entries,
        summary.exits,
        summary.final_state
    );
    if !summary.write_failures.is_empty() {
        log::warn!(
            "watchd: {} events could not be saved",
            summary.write_failures.len()
        );
    }
    Ok(())
}
