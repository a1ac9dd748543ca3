#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Startup pipeline that turns a raster window into a seeded simulation engine.
//!
//! The pipeline validates the window against the raster extent, reads and
//! quantizes the samples, constructs the engine and seeds its sources. Any
//! failure is startup-fatal and leaves nothing half built.

use flowmap_core::{
    CellCoord, ElevationWindow, Engine, EngineError, GridDimensions, RasterError, RasterSource,
};
use flowmap_system_quantizer::{quantize, QuantizeError};
use thiserror::Error;

/// Parameters describing which part of the raster to simulate and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartupConfig {
    window: ElevationWindow,
    cell_size: u32,
    sources: Vec<CellCoord>,
}

impl StartupConfig {
    /// Creates a configuration for the provided window, display cell size and sources.
    #[must_use]
    pub fn new(window: ElevationWindow, cell_size: u32, sources: Vec<CellCoord>) -> Self {
        Self {
            window,
            cell_size,
            sources,
        }
    }

    /// Raster window to simulate.
    #[must_use]
    pub const fn window(&self) -> ElevationWindow {
        self.window
    }

    /// Display size of a single cell in pixels.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Cells seeded as perpetual sources, relative to the window.
    #[must_use]
    pub fn sources(&self) -> &[CellCoord] {
        &self.sources
    }
}

/// Engine prepared by [`Bootstrap::start`] together with quantization details.
#[derive(Debug)]
pub struct Startup<E> {
    /// Seeded engine ready to be handed to the playback controller.
    pub engine: E,
    /// Rounded raw elevation mapped to level 0.
    pub base_level: i64,
    /// Highest quantized level in the grid.
    pub max_level: u8,
    /// Cells clamped at level 255 during quantization.
    pub clamped_cells: usize,
}

/// Startup-fatal failures; the playback controller is never built after one.
#[derive(Debug, PartialEq, Error)]
pub enum StartupError {
    /// The raster could not be fetched.
    #[error("raster source `{location}` is unavailable: {reason}")]
    SourceUnavailable {
        /// Path or URL that was requested.
        location: String,
        /// Underlying failure.
        reason: String,
    },
    /// The configured window reaches past the raster edge.
    #[error(
        "window [{}, {}, {}, {}) exceeds the {}x{} raster",
        .window.left(), .window.top(), .window.right(), .window.bottom(),
        .extent.width(), .extent.height()
    )]
    WindowOutOfBounds {
        /// Configured window.
        window: ElevationWindow,
        /// Size of the raster.
        extent: GridDimensions,
    },
    /// The raster bytes could not be interpreted.
    #[error("malformed raster: {0}")]
    MalformedRaster(String),
    /// The window produced no samples.
    #[error("raster window contained no samples")]
    EmptyRaster,
    /// A sample in the window was NaN or infinite.
    #[error("sample {index} is not finite ({value})")]
    NonFiniteSample {
        /// Row-major index of the sample within the window.
        index: usize,
        /// Offending value.
        value: f64,
    },
    /// The engine rejected the quantized grid.
    #[error("engine construction failed")]
    EngineConstructionFailed(#[source] EngineError),
    /// A configured source lies outside the grid.
    #[error("invalid source configuration")]
    InvalidSource(#[source] EngineError),
}

impl From<RasterError> for StartupError {
    fn from(error: RasterError) -> Self {
        match error {
            RasterError::SourceUnavailable { location, reason } => {
                Self::SourceUnavailable { location, reason }
            }
            RasterError::WindowOutOfBounds { window, extent } => {
                Self::WindowOutOfBounds { window, extent }
            }
            RasterError::MalformedRaster(reason) => Self::MalformedRaster(reason),
        }
    }
}

impl From<QuantizeError> for StartupError {
    fn from(error: QuantizeError) -> Self {
        match error {
            QuantizeError::EmptyRaster => Self::EmptyRaster,
            QuantizeError::NonFiniteSample { index, value } => {
                Self::NonFiniteSample { index, value }
            }
            QuantizeError::Grid(error) => Self::MalformedRaster(error.to_string()),
        }
    }
}

/// Runs the startup pipeline.
#[derive(Clone, Debug)]
pub struct Bootstrap {
    config: StartupConfig,
}

impl Bootstrap {
    /// Creates a bootstrap for the provided configuration.
    #[must_use]
    pub fn new(config: StartupConfig) -> Self {
        Self { config }
    }

    /// Configuration the pipeline runs with.
    #[must_use]
    pub fn config(&self) -> &StartupConfig {
        &self.config
    }

    /// Reads, quantizes and seeds an engine from the configured window of `raster`.
    pub fn start<E, R>(&self, raster: &R) -> Result<Startup<E>, StartupError>
    where
        E: Engine,
        R: RasterSource + ?Sized,
    {
        let window = self.config.window;
        let extent = raster.extent();
        if !window.fits_within(extent) {
            return Err(StartupError::WindowOutOfBounds { window, extent });
        }

        let samples = raster.read_window(window)?;
        if samples.dimensions() != window.dimensions() {
            return Err(StartupError::MalformedRaster(format!(
                "raster returned {}x{} samples for a {}x{} window",
                samples.dimensions().width(),
                samples.dimensions().height(),
                window.dimensions().width(),
                window.dimensions().height()
            )));
        }

        let quantized = quantize(&samples)?;
        let max_level = quantized.grid.max_level();
        log::info!(
            "quantized {}x{} window at ({}, {}): base level {}, relief {}",
            window.dimensions().width(),
            window.dimensions().height(),
            window.left(),
            window.top(),
            quantized.base_level,
            max_level
        );

        let mut engine = E::create(&quantized.grid, self.config.cell_size)
            .map_err(StartupError::EngineConstructionFailed)?;
        for &source in &self.config.sources {
            engine
                .seed_source(source)
                .map_err(StartupError::InvalidSource)?;
            log::info!(
                "seeded source at row {} column {}",
                source.row(),
                source.column()
            );
        }

        Ok(Startup {
            engine,
            base_level: quantized.base_level,
            max_level,
            clamped_cells: quantized.clamped_cells,
        })
    }
}
