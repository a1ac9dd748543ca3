#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Flowmap workspace.
//!
//! This crate defines the data that flows between the raster loader, the
//! quantizer, the simulation engine, the frame decoder and the renderer, as
//! well as the [`Engine`] boundary the playback controller drives. Engines
//! own their packed cell storage and lend it out as a [`PackedFrame`] borrow,
//! so a frame view can never outlive the next [`Engine::tick`] or
//! [`Engine::reset`] call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of packed bytes describing a single cell in an engine frame.
///
/// Fields are stored in the order land level, water level, stream flag.
pub const PACKED_STRIDE: usize = 3;

/// Offset of the land level within a packed cell record.
pub const LAND_FIELD: usize = 0;

/// Offset of the water level within a packed cell record.
pub const WATER_FIELD: usize = 1;

/// Offset of the stream flag within a packed cell record.
pub const STREAM_FIELD: usize = 2;

/// Width and height of a cell grid measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDimensions {
    width: u32,
    height: u32,
}

impl GridDimensions {
    /// Creates a new dimension descriptor.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether either axis is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total number of cells contained in the grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let count = u64::from(self.width) * u64::from(self.height);
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    /// Reports whether the coordinate lies within the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.row() < self.height && cell.column() < self.width
    }

    /// Row-major index of the provided cell, or `None` when it lies outside the grid.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }

        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        Some(row * width + column)
    }

    /// Iterates every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let width = self.width;
        (0..self.height).flat_map(move |row| (0..width).map(move |column| CellCoord::new(row, column)))
    }
}

/// Location of a single grid cell expressed as row and column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: u32,
    column: u32,
}

impl CellCoord {
    /// Creates a new cell coordinate from zero-based row and column indices.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }
}

/// Rectangular raster region requested from a raster source.
///
/// Windows are validated on construction and immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowSpec", into = "WindowSpec")]
pub struct ElevationWindow {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl ElevationWindow {
    /// Creates a window anchored at `left`/`top` spanning `width` × `height` pixels.
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Result<Self, WindowError> {
        if width == 0 || height == 0 {
            return Err(WindowError::ZeroSized { width, height });
        }
        if left.checked_add(width).is_none() || top.checked_add(height).is_none() {
            return Err(WindowError::Overflow { left, top });
        }

        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Column offset of the window's left edge.
    #[must_use]
    pub const fn left(&self) -> u32 {
        self.left
    }

    /// Row offset of the window's top edge.
    #[must_use]
    pub const fn top(&self) -> u32 {
        self.top
    }

    /// Exclusive column bound of the window.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.left + self.width
    }

    /// Exclusive row bound of the window.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Size of the window in pixels, which is also the size of the resulting grid.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        GridDimensions::new(self.width, self.height)
    }

    /// Reports whether the window lies entirely within a raster of the provided extent.
    #[must_use]
    pub const fn fits_within(&self, extent: GridDimensions) -> bool {
        self.right() <= extent.width() && self.bottom() <= extent.height()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct WindowSpec {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl TryFrom<WindowSpec> for ElevationWindow {
    type Error = WindowError;

    fn try_from(spec: WindowSpec) -> Result<Self, Self::Error> {
        Self::new(spec.left, spec.top, spec.width, spec.height)
    }
}

impl From<ElevationWindow> for WindowSpec {
    fn from(window: ElevationWindow) -> Self {
        Self {
            left: window.left,
            top: window.top,
            width: window.width,
            height: window.height,
        }
    }
}

/// Reasons a raster window request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WindowError {
    /// Windows must cover at least one pixel along each axis.
    #[error("window must be non-empty (received {width}x{height})")]
    ZeroSized {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The far edge of the window does not fit in a 32-bit pixel index.
    #[error("window anchored at ({left}, {top}) overflows the pixel index range")]
    Overflow {
        /// Requested left offset.
        left: u32,
        /// Requested top offset.
        top: u32,
    },
}

/// Raw floating-point elevation samples read from a raster window.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterSamples {
    dimensions: GridDimensions,
    values: Vec<f64>,
}

impl RasterSamples {
    /// Wraps row-major samples, validating that they cover the provided dimensions.
    pub fn new(dimensions: GridDimensions, values: Vec<f64>) -> Result<Self, GridError> {
        if values.len() != dimensions.cell_count() {
            return Err(GridError::LengthMismatch {
                dimensions,
                expected: dimensions.cell_count(),
                actual: values.len(),
            });
        }

        Ok(Self { dimensions, values })
    }

    /// Dimensions covered by the samples.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Row-major sample values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Reports whether the array holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample at the provided cell, if it lies within the array.
    #[must_use]
    pub fn sample(&self, cell: CellCoord) -> Option<f64> {
        self.dimensions
            .index(cell)
            .and_then(|index| self.values.get(index).copied())
    }
}

/// Raster that can serve rectangular windows of elevation samples.
pub trait RasterSource {
    /// Full size of the raster in pixels.
    fn extent(&self) -> GridDimensions;

    /// Reads the samples covered by `window`, row-major.
    ///
    /// Windows that do not fit within [`RasterSource::extent`] fail with
    /// [`RasterError::WindowOutOfBounds`].
    fn read_window(&self, window: ElevationWindow) -> Result<RasterSamples, RasterError>;
}

impl RasterSource for RasterSamples {
    fn extent(&self) -> GridDimensions {
        self.dimensions
    }

    fn read_window(&self, window: ElevationWindow) -> Result<RasterSamples, RasterError> {
        if !window.fits_within(self.dimensions) {
            return Err(RasterError::WindowOutOfBounds {
                window,
                extent: self.dimensions,
            });
        }

        let width = self.dimensions.width() as usize;
        let mut values = Vec::with_capacity(window.dimensions().cell_count());
        for row in window.top()..window.bottom() {
            let start = row as usize * width + window.left() as usize;
            let end = start + window.dimensions().width() as usize;
            values.extend_from_slice(&self.values[start..end]);
        }

        RasterSamples::new(window.dimensions(), values)
            .map_err(|error| RasterError::MalformedRaster(error.to_string()))
    }
}

/// Failures reported while fetching or reading a raster.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RasterError {
    /// The raster could not be fetched.
    #[error("raster source `{location}` is unavailable: {reason}")]
    SourceUnavailable {
        /// Path or URL that was requested.
        location: String,
        /// Description of the underlying network or filesystem failure.
        reason: String,
    },
    /// The requested window reaches past the raster edge.
    #[error(
        "window [{}, {}, {}, {}) exceeds the {}x{} raster",
        .window.left(), .window.top(), .window.right(), .window.bottom(),
        .extent.width(), .extent.height()
    )]
    WindowOutOfBounds {
        /// Requested window.
        window: ElevationWindow,
        /// Size of the raster.
        extent: GridDimensions,
    },
    /// The raster bytes could not be interpreted.
    #[error("malformed raster: {0}")]
    MalformedRaster(String),
}

/// Quantized, zero-based elevation levels ready for engine construction.
///
/// The lowest level in a grid is always `0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElevationGrid {
    dimensions: GridDimensions,
    levels: Vec<u8>,
}

impl ElevationGrid {
    /// Wraps row-major levels after checking the length and zero-minimum invariants.
    pub fn from_levels(dimensions: GridDimensions, levels: Vec<u8>) -> Result<Self, GridError> {
        if dimensions.is_empty() {
            return Err(GridError::ZeroSized { dimensions });
        }
        if levels.len() != dimensions.cell_count() {
            return Err(GridError::LengthMismatch {
                dimensions,
                expected: dimensions.cell_count(),
                actual: levels.len(),
            });
        }
        let minimum = levels.iter().copied().min().unwrap_or(0);
        if minimum != 0 {
            return Err(GridError::NonZeroMinimum { minimum });
        }

        Ok(Self { dimensions, levels })
    }

    /// Dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Row-major elevation levels.
    #[must_use]
    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// Level stored at the provided cell, if it lies within the grid.
    #[must_use]
    pub fn level(&self, cell: CellCoord) -> Option<u8> {
        self.dimensions
            .index(cell)
            .and_then(|index| self.levels.get(index).copied())
    }

    /// Highest level present in the grid.
    #[must_use]
    pub fn max_level(&self) -> u8 {
        self.levels.iter().copied().max().unwrap_or(0)
    }
}

/// Reasons a sample array or elevation grid fails validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The number of values does not equal `width * height`.
    #[error("expected {expected} values for a {}x{} grid, received {actual}", .dimensions.width(), .dimensions.height())]
    LengthMismatch {
        /// Dimensions the values were meant to cover.
        dimensions: GridDimensions,
        /// Number of values implied by the dimensions.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
    /// Grids must cover at least one cell.
    #[error("grid must be non-empty (received {}x{})", .dimensions.width(), .dimensions.height())]
    ZeroSized {
        /// Rejected dimensions.
        dimensions: GridDimensions,
    },
    /// Quantized grids are relative to their lowest cell.
    #[error("quantized grid minimum must be 0 (found {minimum})")]
    NonZeroMinimum {
        /// Lowest level found in the supplied values.
        minimum: u8,
    },
}

/// Decoded state of a single simulation cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellState {
    /// Terrain level of the cell.
    pub land_level: u8,
    /// Depth of standing water on the cell.
    pub water_level: u8,
    /// Whether water is flowing across the cell.
    pub is_stream: bool,
}

impl CellState {
    /// Creates a new cell state descriptor.
    #[must_use]
    pub const fn new(land_level: u8, water_level: u8, is_stream: bool) -> Self {
        Self {
            land_level,
            water_level,
            is_stream,
        }
    }

    /// Reports whether standing water covers the cell.
    #[must_use]
    pub const fn is_wet(&self) -> bool {
        self.water_level > 0
    }
}

/// Aggregate engine measurements used for steady-state detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMetrics {
    /// Total standing water volume across the grid.
    pub total_water: u64,
    /// Number of cells with water flowing across them, sources included.
    pub total_flowing: u64,
}

impl FlowMetrics {
    /// Creates a new metrics snapshot.
    #[must_use]
    pub const fn new(total_water: u64, total_flowing: u64) -> Self {
        Self {
            total_water,
            total_flowing,
        }
    }
}

/// Read-only view of an engine's packed cell storage.
///
/// The view borrows the engine, so it must be consumed before the engine is
/// ticked or reset again.
#[derive(Clone, Copy, Debug)]
pub struct PackedFrame<'a> {
    bytes: &'a [u8],
    dimensions: GridDimensions,
}

impl<'a> PackedFrame<'a> {
    /// Wraps packed cell bytes laid out with [`PACKED_STRIDE`] bytes per cell.
    #[must_use]
    pub const fn new(bytes: &'a [u8], dimensions: GridDimensions) -> Self {
        Self { bytes, dimensions }
    }

    /// Raw packed bytes.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Grid dimensions the bytes describe.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }
}

/// Typed per-cell records decoded from a [`PackedFrame`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    dimensions: GridDimensions,
    cells: Vec<CellState>,
}

impl DecodedFrame {
    /// Wraps decoded records, validating that they cover the provided dimensions.
    pub fn new(dimensions: GridDimensions, cells: Vec<CellState>) -> Result<Self, DecodeError> {
        let expected = dimensions.cell_count();
        if cells.len() != expected {
            return Err(DecodeError::LengthMismatch {
                expected,
                actual: cells.len(),
            });
        }

        Ok(Self { dimensions, cells })
    }

    /// Dimensions of the decoded grid.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Decoded record of the provided cell.
    ///
    /// Coordinates outside the grid are reported rather than clamped.
    pub fn cell(&self, cell: CellCoord) -> Result<CellState, DecodeError> {
        self.dimensions
            .index(cell)
            .and_then(|index| self.cells.get(index).copied())
            .ok_or(DecodeError::OutOfRange {
                cell,
                dimensions: self.dimensions,
            })
    }

    /// Iterates every cell with its coordinate in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, CellState)> + '_ {
        self.dimensions.cells().zip(self.cells.iter().copied())
    }

    /// Row-major decoded records.
    #[must_use]
    pub fn records(&self) -> &[CellState] {
        &self.cells
    }
}

/// Failures reported while decoding packed engine frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A coordinate outside the grid was requested.
    #[error("cell ({}, {}) lies outside the {}x{} grid", .cell.row(), .cell.column(), .dimensions.width(), .dimensions.height())]
    OutOfRange {
        /// Requested cell.
        cell: CellCoord,
        /// Dimensions of the decoded grid.
        dimensions: GridDimensions,
    },
    /// The buffer does not hold exactly one record per cell.
    #[error("expected {expected} packed entries, received {actual}")]
    LengthMismatch {
        /// Entries implied by the grid dimensions.
        expected: usize,
        /// Entries present in the buffer.
        actual: usize,
    },
}

/// Simulation engine driven by the playback controller.
///
/// Implementations are single-owner: the controller is the only caller and
/// never invokes methods concurrently.
pub trait Engine {
    /// Constructs an engine from a quantized grid and the display cell size in pixels.
    fn create(grid: &ElevationGrid, cell_size: u32) -> Result<Self, EngineError>
    where
        Self: Sized;

    /// Advances the simulation by one discrete step.
    fn tick(&mut self);

    /// Reverts all accumulated water while preserving terrain and sources.
    fn reset(&mut self);

    /// Marks a perpetual water source at the provided cell.
    fn seed_source(&mut self, cell: CellCoord) -> Result<(), EngineError>;

    /// Dimensions of the simulated grid.
    fn dimensions(&self) -> GridDimensions;

    /// Aggregate measurements of the current state.
    fn metrics(&self) -> FlowMetrics;

    /// Read-only view of the packed per-cell state.
    fn packed_cells(&self) -> PackedFrame<'_>;
}

/// Failures reported by engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The grid does not hold one level per cell.
    #[error("grid holds {actual} levels but {}x{} requires {expected}", .dimensions.width(), .dimensions.height())]
    GridMismatch {
        /// Dimensions declared by the grid.
        dimensions: GridDimensions,
        /// Levels implied by the dimensions.
        expected: usize,
        /// Levels present in the grid.
        actual: usize,
    },
    /// Engines require a positive display cell size.
    #[error("cell size must be positive")]
    InvalidCellSize,
    /// A source was requested outside the grid.
    #[error("source cell ({}, {}) lies outside the {}x{} grid", .cell.row(), .cell.column(), .dimensions.width(), .dimensions.height())]
    SourceOutOfBounds {
        /// Requested source cell.
        cell: CellCoord,
        /// Dimensions of the simulated grid.
        dimensions: GridDimensions,
    },
}

/// Receives every decoded frame produced by the playback controller.
pub trait FrameSink {
    /// Error reported when a frame cannot be presented.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Presents a fully decoded frame.
    fn present(&mut self, frame: &DecodedFrame) -> Result<(), Self::Error>;
}

/// Playback state of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// No cycle is scheduled.
    Paused,
    /// A cycle is scheduled for the next frame.
    Running,
}

/// Explains why the controller entered [`PlaybackMode::Paused`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseReason {
    /// The user requested a pause.
    User,
    /// The simulation reached equilibrium.
    SteadyState,
    /// The simulation was restarted.
    Restart,
    /// A cycle could not decode or present its frame.
    Failed,
}

/// User controls accepted by the playback controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackCommand {
    /// Starts the animation loop; ignored while running.
    Play,
    /// Stops the animation loop; ignored while paused.
    Pause,
    /// Plays when paused and pauses when running.
    TogglePlay,
    /// Runs a single cycle; ignored while running.
    Step,
    /// Resets the simulation and pauses.
    Restart,
}

/// Observable transitions emitted by the playback controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The animation loop started.
    Resumed,
    /// The engine advanced and the frame was presented.
    Ticked {
        /// Number of ticks performed since construction.
        tick: u64,
        /// Metrics observed after the tick.
        metrics: FlowMetrics,
    },
    /// The controller entered the paused state.
    Paused {
        /// Why the controller paused.
        reason: PauseReason,
    },
    /// The engine was reset and the reset state presented.
    Restarted,
}
