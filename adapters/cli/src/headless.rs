//! Windowless playback that runs until the simulation halts.

use std::{fmt, fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use flowmap_core::{Engine, FlowMetrics, FrameSink, GridDimensions, PauseReason, PlaybackEvent};
use flowmap_rendering::PixelCanvas;
use flowmap_system_playback::{PlaybackController, Scheduler};
use serde::Serialize;

/// Why a headless run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum HaltReason {
    /// Total water stopped changing with a single flowing cell.
    SteadyState,
    /// The configured tick limit was reached first.
    TickLimit,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::SteadyState => f.write_str("steady state"),
            HaltReason::TickLimit => f.write_str("tick limit"),
        }
    }
}

/// Outcome of a headless run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct RunSummary {
    /// Grid width in cells.
    pub(crate) width: u32,
    /// Grid height in cells.
    pub(crate) height: u32,
    /// Rounded raw elevation mapped to level 0.
    pub(crate) base_level: i64,
    /// Highest quantized level.
    pub(crate) max_level: u8,
    /// Cells clamped during quantization.
    pub(crate) clamped_cells: usize,
    /// Ticks performed.
    pub(crate) ticks: u64,
    /// Standing water after the final tick.
    pub(crate) total_water: u64,
    /// Flowing cells after the final tick.
    pub(crate) total_flowing: u64,
    /// Why the run stopped.
    pub(crate) halt: HaltReason,
}

impl RunSummary {
    /// Renders the summary as human-readable lines.
    pub(crate) fn to_text(&self) -> String {
        format!(
            "grid: {}x{} cells (base elevation {}, max level {}, {} clamped)\n\
             ticks: {}\n\
             water: {}\n\
             flowing: {}\n\
             halted: {}",
            self.width,
            self.height,
            self.base_level,
            self.max_level,
            self.clamped_cells,
            self.ticks,
            self.total_water,
            self.total_flowing,
            self.halt,
        )
    }

    /// Renders the summary as a JSON object.
    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialise run summary")
    }
}

/// Quantization details carried from startup into the summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GridInfo {
    /// Simulated grid.
    pub(crate) dimensions: GridDimensions,
    /// Rounded raw elevation mapped to level 0.
    pub(crate) base_level: i64,
    /// Highest quantized level.
    pub(crate) max_level: u8,
    /// Cells clamped during quantization.
    pub(crate) clamped_cells: usize,
}

/// Plays the controller until it pauses on its own or `max_ticks` is reached.
pub(crate) fn run<E, S, F>(
    controller: &mut PlaybackController<E, S, F>,
    max_ticks: Option<u64>,
) -> Result<HaltReason>
where
    E: Engine,
    S: Scheduler,
    F: FrameSink,
{
    controller.play();
    loop {
        if controller.is_paused() {
            return halt_reason(&controller.drain_events()).context("playback paused unexpectedly");
        }
        if max_ticks.is_some_and(|limit| controller.tick_count() >= limit) {
            controller.pause();
            log::info!("tick limit of {} reached", controller.tick_count());
            return Ok(HaltReason::TickLimit);
        }
        let _ = controller.poll().context("playback cycle failed")?;
    }
}

fn halt_reason(events: &[PlaybackEvent]) -> Option<HaltReason> {
    events.iter().rev().find_map(|event| match event {
        PlaybackEvent::Paused {
            reason: PauseReason::SteadyState,
        } => Some(HaltReason::SteadyState),
        _ => None,
    })
}

/// Builds the summary of a finished run.
pub(crate) fn summarise(
    grid: GridInfo,
    ticks: u64,
    metrics: FlowMetrics,
    halt: HaltReason,
) -> RunSummary {
    RunSummary {
        width: grid.dimensions.width(),
        height: grid.dimensions.height(),
        base_level: grid.base_level,
        max_level: grid.max_level,
        clamped_cells: grid.clamped_cells,
        ticks,
        total_water: metrics.total_water,
        total_flowing: metrics.total_flowing,
        halt,
    }
}

/// Writes the canvas to `path` as a binary PPM image.
pub(crate) fn write_snapshot(canvas: &PixelCanvas, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create snapshot at {}", path.display()))?;
    canvas
        .write_ppm(BufWriter::new(file))
        .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
    log::info!("wrote {}x{} snapshot to {}", canvas.width(), canvas.height(), path.display());
    Ok(())
}
