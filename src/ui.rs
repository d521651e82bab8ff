//! Presentation-side collaborators.
//!
//! The detection core never renders, beeps or reads input itself. It calls into
//! these traits, and a headless deployment plugs in the no-op implementations.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::detect::{CrossingConfig, Region};
use crate::frame::Frame;
use crate::overlay;

// ----------------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------------

/// "Display frame" capability: receives each processed frame with its overlay regions.
pub trait FrameDisplay {
    fn show(&mut self, frame: &Frame, regions: &[Region]);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullDisplay;

impl FrameDisplay for NullDisplay {
    fn show(&mut self, _frame: &Frame, _regions: &[Region]) {}
}

/// Writes an annotated preview image every `every` frames, overwriting the last one.
pub struct PreviewFileDisplay {
    path: PathBuf,
    every: u64,
    zones: Option<CrossingConfig>,
    shown: u64,
}

impl PreviewFileDisplay {
    pub fn new(path: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            path: path.into(),
            every: every.max(1),
            zones: None,
            shown: 0,
        }
    }

    /// Also draw the crossing-zone guide lines.
    pub fn with_zones(mut self, zones: CrossingConfig) -> Self {
        self.zones = Some(zones);
        self
    }
}

impl FrameDisplay for PreviewFileDisplay {
    fn show(&mut self, frame: &Frame, regions: &[Region]) {
        self.shown += 1;
        if (self.shown - 1) % self.every != 0 {
            return;
        }
        let mut canvas = frame.to_rgb();
        if let Some(zones) = &self.zones {
            overlay::draw_zone_guides(&mut canvas, zones);
        }
        overlay::draw_regions(&mut canvas, regions);
        if let Err(e) = canvas.save(&self.path) {
            log::warn!("preview write to {} failed: {}", self.path.display(), e);
        }
    }
}

// ----------------------------------------------------------------------------
// Alert
// ----------------------------------------------------------------------------

/// "Emit audible alert" capability. Fired once per detected intrusion.
pub trait AlertEmitter {
    fn emit_alert(&mut self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAlert;

impl AlertEmitter for SilentAlert {
    fn emit_alert(&mut self) {}
}

/// Rings the terminal bell on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl AlertEmitter for TerminalBell {
    fn emit_alert(&mut self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            log::warn!("terminal bell failed: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// Stop signal
// ----------------------------------------------------------------------------

/// Cooperative cancellation, polled once per processing cycle.
pub trait StopSignal {
    fn stop_requested(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn stop_requested(&self) -> bool {
        false
    }
}

impl StopSignal for AtomicBool {
    fn stop_requested(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Stop flag raised by Ctrl-C.
#[derive(Clone, Debug)]
pub struct CtrlCStop {
    flag: Arc<AtomicBool>,
}

impl CtrlCStop {
    /// Install the process-wide Ctrl-C handler. Can only succeed once per process.
    pub fn install() -> Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&flag);
        ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
        Ok(Self { flag })
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl StopSignal for CtrlCStop {
    fn stop_requested(&self) -> bool {
        self.flag.stop_requested()
    }
}
