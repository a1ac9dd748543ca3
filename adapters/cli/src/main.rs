#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that loads an elevation raster and animates the flow.

mod config;
mod headless;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use flowmap_core::Engine;
use flowmap_raster::{GeoTiffRaster, SourceLocation};
use flowmap_rendering::{
    Color, PixelCanvas, PlaybackStatus, Presentation, Renderer, RenderingBackend, Scene,
};
use flowmap_rendering_macroquad::MacroquadBackend;
use flowmap_system_bootstrap::{Bootstrap, Startup, StartupConfig};
use flowmap_system_playback::{FrameScheduler, PlaybackController};
use flowmap_world::Landscape;

use self::config::{Cli, FileConfig, ReportFormat, Settings};
use self::headless::GridInfo;

type Controller = PlaybackController<Landscape, FrameScheduler, Renderer<PixelCanvas>>;

/// Entry point for the Flowmap command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(file, &cli)?;

    let raster = load_raster(&settings.source)?;
    let startup: Startup<Landscape> = Bootstrap::new(StartupConfig::new(
        settings.window,
        settings.cell_size,
        settings.sources.clone(),
    ))
    .start(&raster)
    .context("failed to start the simulation")?;

    let grid = GridInfo {
        dimensions: startup.engine.dimensions(),
        base_level: startup.base_level,
        max_level: startup.max_level,
        clamped_cells: startup.clamped_cells,
    };
    let renderer = Renderer::new(PixelCanvas::default(), grid.dimensions, settings.cell_size)
        .context("failed to prepare the canvas")?;
    let mut controller = PlaybackController::new(startup.engine, FrameScheduler::new(), renderer);
    controller.present().context("failed to present the initial frame")?;

    if cli.headless {
        run_headless(controller, grid, &cli, settings.sources.len())
    } else {
        run_window(controller, &settings)
    }
}

fn load_raster(location: &SourceLocation) -> Result<GeoTiffRaster> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime
        .block_on(flowmap_raster::open(location))
        .with_context(|| format!("failed to load elevation raster from {location}"))
}

fn run_headless(
    mut controller: Controller,
    grid: GridInfo,
    cli: &Cli,
    source_count: usize,
) -> Result<()> {
    if cli.max_ticks.is_none() && source_count != 1 {
        log::warn!(
            "steady state is only detected for a single source; \
             pass --max-ticks to bound a run with {source_count} sources"
        );
    }

    let halt = headless::run(&mut controller, cli.max_ticks)?;
    let metrics = controller.last_metrics().unwrap_or_else(|| controller.engine().metrics());
    let summary = headless::summarise(grid, controller.tick_count(), metrics, halt);

    match cli.report {
        ReportFormat::Text => println!("{}", summary.to_text()),
        ReportFormat::Json => println!("{}", summary.to_json()?),
    }

    if let Some(path) = &cli.snapshot {
        headless::write_snapshot(controller.sink().surface(), path)?;
    }
    Ok(())
}

fn run_window(mut controller: Controller, settings: &Settings) -> Result<()> {
    let status = PlaybackStatus {
        metrics: controller.engine().metrics(),
        ..PlaybackStatus::default()
    };
    let scene = Scene::new(controller.sink().surface().clone(), status);
    let presentation = Presentation::new("Flowmap", Color::from_rgb_u8(0x12, 0x12, 0x12), scene);

    let backend = MacroquadBackend::new()
        .with_vsync(settings.display.vsync)
        .with_show_fps(settings.display.show_fps);

    backend.run(presentation, move |input, scene| {
        for command in input.commands {
            controller
                .apply(command)
                .with_context(|| format!("failed to apply {command:?}"))?;
        }
        let _ = controller.poll().context("playback cycle failed")?;

        if status::track(&mut scene.status, &controller.drain_events()) {
            scene.status.metrics = controller.engine().metrics();
            scene.canvas.clone_from(controller.sink().surface());
        }
        Ok(())
    })
}

