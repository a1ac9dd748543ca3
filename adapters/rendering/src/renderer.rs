//! Paints decoded frames onto a [`Surface`].

use flowmap_core::{DecodedFrame, FrameSink, GridDimensions};
use thiserror::Error;

use crate::canvas::{CanvasLayout, Surface};
use crate::{cell_color, GRID_LINE_COLOR};

/// Failures reported while painting frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The display cell size was zero.
    #[error("cell size must be positive")]
    InvalidCellSize,
    /// The frame does not match the grid the surface was prepared for.
    #[error(
        "frame is {}x{} but the surface was prepared for {}x{}",
        .actual.width(), .actual.height(), .expected.width(), .expected.height()
    )]
    DimensionMismatch {
        /// Grid the layout was built for.
        expected: GridDimensions,
        /// Grid of the rejected frame.
        actual: GridDimensions,
    },
}

/// Paints every cell of a decoded frame using the cell palette.
///
/// The surface is sized and cleared to the grid-line color once, before the
/// first paint, and never resized afterwards.
#[derive(Clone, Debug)]
pub struct Renderer<S> {
    surface: S,
    layout: CanvasLayout,
    prepared: bool,
}

impl<S: Surface> Renderer<S> {
    /// Creates a renderer drawing `grid` with square cells of `cell_size` pixels.
    pub fn new(surface: S, grid: GridDimensions, cell_size: u32) -> Result<Self, RenderError> {
        let layout = CanvasLayout::new(grid, cell_size).ok_or(RenderError::InvalidCellSize)?;
        Ok(Self {
            surface,
            layout,
            prepared: false,
        })
    }

    /// Layout used to position cells.
    #[must_use]
    pub fn layout(&self) -> CanvasLayout {
        self.layout
    }

    /// Surface painted by the renderer.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Consumes the renderer, returning its surface.
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Sizes the surface and fills it with the grid-line color. Only the first call has any effect.
    pub fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        let size = self.layout.surface_size();
        self.surface.resize(size);
        self.surface.fill_rect(glam::UVec2::ZERO, size, GRID_LINE_COLOR);
        self.prepared = true;
        log::debug!("surface prepared at {}x{} pixels", size.x, size.y);
    }

    /// Paints every cell of `frame`.
    pub fn paint(&mut self, frame: &DecodedFrame) -> Result<(), RenderError> {
        let expected = self.layout.grid();
        if frame.dimensions() != expected {
            return Err(RenderError::DimensionMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }

        self.prepare();
        let extent = self.layout.cell_extent();
        for (cell, state) in frame.iter() {
            self.surface
                .fill_rect(self.layout.cell_origin(cell), extent, cell_color(state));
        }
        Ok(())
    }
}

impl<S: Surface> FrameSink for Renderer<S> {
    type Error = RenderError;

    fn present(&mut self, frame: &DecodedFrame) -> Result<(), Self::Error> {
        self.paint(frame)
    }
}
