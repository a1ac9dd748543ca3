#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reference landscape engine for Flowmap.
//!
//! Every cell carries a constant land level, a variable standing-water level
//! and a flag recording whether water is flowing across it. On each tick an
//! interior cell starts flowing when a flowing or wet neighbour sits strictly
//! higher than it, and a cell that is also the lowest point of its
//! neighbourhood collects one unit of standing water instead. Seeded sources
//! keep flowing forever. The outer rim is sealed so water never leaves the
//! grid.

use flowmap_core::{
    CellCoord, ElevationGrid, Engine, EngineError, FlowMetrics, GridDimensions, PackedFrame,
    PACKED_STRIDE,
};

/// Land level assigned to the sealed rim of the landscape.
pub const RIM_LEVEL: u8 = u8::MAX;

/// Highest combined land and water level a cell may reach.
const MAX_TOTAL_LEVEL: u16 = u8::MAX as u16;

const NEIGHBOUR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct LandCell {
    land_level: u8,
    water_level: u8,
    flowing: bool,
}

impl LandCell {
    fn is_wet(&self) -> bool {
        self.water_level > 0
    }

    fn total_level(&self) -> u16 {
        u16::from(self.land_level) + u16::from(self.water_level)
    }

    fn feeds(&self, other: &LandCell) -> bool {
        (self.flowing || self.is_wet()) && self.total_level() > other.total_level()
    }
}

/// Authoritative landscape state driven through the [`Engine`] trait.
#[derive(Clone, Debug)]
pub struct Landscape {
    dimensions: GridDimensions,
    cell_size: u32,
    cells: Vec<LandCell>,
    sources: Vec<CellCoord>,
    packed: Vec<u8>,
    metrics: FlowMetrics,
    tick_index: u64,
}

impl Landscape {
    /// Builds a landscape from raw row-major levels.
    ///
    /// Returns an error when the level count does not match the dimensions or
    /// when the cell size is zero.
    pub fn from_levels(
        dimensions: GridDimensions,
        levels: &[u8],
        cell_size: u32,
    ) -> Result<Self, EngineError> {
        let expected = dimensions.cell_count();
        if dimensions.is_empty() || levels.len() != expected {
            return Err(EngineError::GridMismatch {
                dimensions,
                expected,
                actual: levels.len(),
            });
        }
        if cell_size == 0 {
            return Err(EngineError::InvalidCellSize);
        }

        let cells = dimensions
            .cells()
            .zip(levels.iter().copied())
            .map(|(cell, level)| LandCell {
                land_level: if is_rim(dimensions, cell) {
                    RIM_LEVEL
                } else {
                    level
                },
                water_level: 0,
                flowing: false,
            })
            .collect();

        let mut landscape = Self {
            dimensions,
            cell_size,
            cells,
            sources: Vec::new(),
            packed: vec![0; expected * PACKED_STRIDE],
            metrics: FlowMetrics::default(),
            tick_index: 0,
        };
        landscape.refresh();
        log::info!(
            "landscape created: {}x{} cells, cell size {}px",
            dimensions.width(),
            dimensions.height(),
            cell_size
        );
        Ok(landscape)
    }

    /// Display size of a single cell in pixels.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        self.dimensions.index(cell)
    }

    fn is_source(&self, cell: CellCoord) -> bool {
        self.sources.contains(&cell)
    }

    fn neighbours(&self, cells: &[LandCell], cell: CellCoord) -> [LandCell; 8] {
        let mut out = [LandCell::default(); 8];
        for (slot, (delta_row, delta_column)) in out.iter_mut().zip(NEIGHBOUR_OFFSETS) {
            let row = u32::try_from(i64::from(cell.row()) + delta_row);
            let column = u32::try_from(i64::from(cell.column()) + delta_column);
            let (Ok(row), Ok(column)) = (row, column) else {
                continue;
            };
            if let Some(index) = self.index(CellCoord::new(row, column)) {
                *slot = cells[index];
            }
        }
        out
    }

    fn refresh(&mut self) {
        let mut total_water = 0u64;
        let mut total_flowing = 0u64;
        for (cell, packed) in self
            .cells
            .iter()
            .zip(self.packed.chunks_exact_mut(PACKED_STRIDE))
        {
            packed[flowmap_core::LAND_FIELD] = cell.land_level;
            packed[flowmap_core::WATER_FIELD] = cell.water_level;
            packed[flowmap_core::STREAM_FIELD] = u8::from(cell.flowing);
            total_water += u64::from(cell.water_level);
            total_flowing += u64::from(cell.flowing);
        }
        self.metrics = FlowMetrics::new(total_water, total_flowing);
    }
}

impl Engine for Landscape {
    fn create(grid: &ElevationGrid, cell_size: u32) -> Result<Self, EngineError> {
        Self::from_levels(grid.dimensions(), grid.levels(), cell_size)
    }

    fn tick(&mut self) {
        let previous = self.cells.clone();
        let width = self.dimensions.width();
        let height = self.dimensions.height();

        for row in 1..height.saturating_sub(1) {
            for column in 1..width.saturating_sub(1) {
                let coord = CellCoord::new(row, column);
                let Some(index) = self.index(coord) else {
                    continue;
                };
                let cell = previous[index];
                let neighbours = self.neighbours(&previous, coord);
                let fed = neighbours.iter().any(|neighbour| neighbour.feeds(&cell));
                let lowest = neighbours
                    .iter()
                    .all(|neighbour| neighbour.total_level() >= cell.total_level());
                let source = self.is_source(coord);

                let next = &mut self.cells[index];
                if fed {
                    next.flowing = true;
                    if lowest {
                        if cell.total_level() < MAX_TOTAL_LEVEL {
                            next.water_level += 1;
                        }
                        next.flowing = false;
                    }
                }
                if source {
                    next.flowing = true;
                }
            }
        }

        self.tick_index = self.tick_index.saturating_add(1);
        self.refresh();
        log::debug!(
            "tick {}: {} water, {} cells flowing",
            self.tick_index,
            self.metrics.total_water,
            self.metrics.total_flowing
        );
    }

    fn reset(&mut self) {
        let sources = self.sources.clone();
        for (cell, state) in self.dimensions.cells().zip(self.cells.iter_mut()) {
            state.water_level = 0;
            state.flowing = sources.contains(&cell);
        }
        self.tick_index = 0;
        self.refresh();
        log::info!("landscape reset; {} sources retained", sources.len());
    }

    fn seed_source(&mut self, cell: CellCoord) -> Result<(), EngineError> {
        let index = self.index(cell).ok_or(EngineError::SourceOutOfBounds {
            cell,
            dimensions: self.dimensions,
        })?;
        self.cells[index].flowing = true;
        if !self.is_source(cell) {
            self.sources.push(cell);
        }
        self.refresh();
        Ok(())
    }

    fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    fn metrics(&self) -> FlowMetrics {
        self.metrics
    }

    fn packed_cells(&self) -> PackedFrame<'_> {
        PackedFrame::new(&self.packed, self.dimensions)
    }
}

/// Query functions that provide read-only access to the landscape.
pub mod query {
    use super::Landscape;
    use flowmap_core::CellCoord;

    /// Number of ticks performed since construction or the last reset.
    #[must_use]
    pub fn tick_index(landscape: &Landscape) -> u64 {
        landscape.tick_index
    }

    /// Perpetual sources seeded into the landscape, in seeding order.
    #[must_use]
    pub fn sources(landscape: &Landscape) -> &[CellCoord] {
        &landscape.sources
    }

    /// Land level stored at the provided cell.
    #[must_use]
    pub fn land_level(landscape: &Landscape, cell: CellCoord) -> Option<u8> {
        landscape
            .index(cell)
            .map(|index| landscape.cells[index].land_level)
    }

    /// Standing water stored at the provided cell.
    #[must_use]
    pub fn water_level(landscape: &Landscape, cell: CellCoord) -> Option<u8> {
        landscape
            .index(cell)
            .map(|index| landscape.cells[index].water_level)
    }

    /// Reports whether water is flowing across the provided cell.
    #[must_use]
    pub fn is_flowing(landscape: &Landscape, cell: CellCoord) -> Option<bool> {
        landscape
            .index(cell)
            .map(|index| landscape.cells[index].flowing)
    }
}

fn is_rim(dimensions: GridDimensions, cell: CellCoord) -> bool {
    cell.row() == 0
        || cell.column() == 0
        || cell.row() + 1 == dimensions.height()
        || cell.column() + 1 == dimensions.width()
}
