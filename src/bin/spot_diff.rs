//! spot_diff - one-shot scene change check
//!
//! Compares a current snapshot against a baseline, either two image files or
//! two frames taken from a source some time apart. Any significant structural
//! change rings the alert and saves the annotated frame under `stolen/`.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use watchpost::config::WatchConfig;
use watchpost::pipeline::capture_snapshot_pair;
use watchpost::ui::TerminalBell;
use watchpost::{
    compare_snapshots, open_source, AlertEmitter, EventSink, FrameInput, OutputFormat,
    SilentAlert,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect scene changes between two snapshots")]
struct Args {
    /// JSON or TOML config file (defaults to $WATCHPOST_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Current snapshot image (use together with --baseline).
    #[arg(long, requires = "baseline")]
    current: Option<PathBuf>,

    /// Baseline snapshot image.
    #[arg(long, requires = "current")]
    baseline: Option<PathBuf>,

    /// Take both snapshots from this source instead of image files.
    #[arg(long, conflicts_with_all = ["current", "baseline"])]
    source: Option<String>,

    /// Wait between the baseline and the current snapshot when using a source.
    #[arg(long, default_value = "3000")]
    delay_ms: u64,

    /// Base directory for stolen/.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Saved image format (jpeg or png).
    #[arg(long)]
    format: Option<String>,

    /// Do not ring the terminal bell on a change.
    #[arg(long)]
    silent: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match args.config.as_deref() {
        Some(path) => WatchConfig::load_from(Some(path))?,
        None => WatchConfig::load()?,
    };
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    if let Some(name) = args.format.as_deref() {
        cfg.image_format = OutputFormat::parse(name)
            .ok_or_else(|| anyhow!("unsupported --format {:?} (jpeg or png)", name))?;
    }

    let (current, baseline): (FrameInput, FrameInput) = match (args.current, args.baseline) {
        (Some(current), Some(baseline)) => (current.into(), baseline.into()),
        _ => {
            if let Some(source) = args.source {
                cfg.source.uri = source;
            }
            let mut source = open_source(&cfg.source)?;
            log::info!(
                "spot_diff: baseline from {}, current in {} ms",
                cfg.source.uri,
                args.delay_ms
            );
            let (baseline, current) = capture_snapshot_pair(
                &mut **source,
                Duration::from_millis(args.delay_ms),
                cfg.tracking.mirror_frames,
            )?;
            (current.into(), baseline.into())
        }
    };

    let mut sink = EventSink::new(&cfg.output_dir, cfg.image_format);
    let mut alert: Box<dyn AlertEmitter> = if args.silent {
        Box::new(SilentAlert)
    } else {
        Box::new(TerminalBell)
    };

    let outcome = compare_snapshots(current, baseline, &cfg.snapshot, &mut sink, alert.as_mut())?;
    match &outcome.persisted {
        None => println!("no change (similarity {:.4})", outcome.comparison.score),
        Some(Ok(path)) => println!(
            "CHANGE DETECTED in {} regions (similarity {:.4}), saved {}",
            outcome.comparison.regions.len(),
            outcome.comparison.score,
            path.display()
        ),
        Some(Err(e)) => println!(
            "CHANGE DETECTED in {} regions (similarity {:.4}), not saved: {}",
            outcome.comparison.regions.len(),
            outcome.comparison.score,
            e
        ),
    }
    Ok(())
}
