//! Pixel surfaces and the cell layout painted onto them.

use std::io::{self, Write};

use flowmap_core::{CellCoord, GridDimensions};
use glam::UVec2;

use crate::Color;

/// Drawing target the renderer paints cells onto.
pub trait Surface {
    /// Current size of the surface in pixels.
    fn size(&self) -> UVec2;

    /// Resizes the surface, discarding its contents.
    fn resize(&mut self, size: UVec2);

    /// Fills an axis-aligned rectangle. Pixels outside the surface are skipped.
    fn fill_rect(&mut self, origin: UVec2, size: UVec2, color: Color);
}

/// Maps grid cells onto surface pixels.
///
/// Cells are `cell_size` pixels square and separated by one-pixel grid lines,
/// including a line along every outer edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasLayout {
    grid: GridDimensions,
    cell_size: u32,
}

impl CanvasLayout {
    /// Creates a layout for the provided grid and cell size.
    ///
    /// Returns `None` when the cell size is zero.
    #[must_use]
    pub fn new(grid: GridDimensions, cell_size: u32) -> Option<Self> {
        (cell_size > 0).then_some(Self { grid, cell_size })
    }

    /// Grid dimensions the layout was built for.
    #[must_use]
    pub const fn grid(&self) -> GridDimensions {
        self.grid
    }

    /// Size of a single cell in pixels.
    #[must_use]
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Surface size required to show the whole grid.
    #[must_use]
    pub fn surface_size(&self) -> UVec2 {
        let pitch = self.cell_size + 1;
        UVec2::new(
            pitch * self.grid.width() + 1,
            pitch * self.grid.height() + 1,
        )
    }

    /// Top-left pixel of the provided cell.
    #[must_use]
    pub fn cell_origin(&self, cell: CellCoord) -> UVec2 {
        let pitch = self.cell_size + 1;
        UVec2::new(cell.column() * pitch + 1, cell.row() * pitch + 1)
    }

    /// Size of a cell in pixels along both axes.
    #[must_use]
    pub fn cell_extent(&self) -> UVec2 {
        UVec2::splat(self.cell_size)
    }
}

/// In-memory RGBA surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelCanvas {
    size: UVec2,
    pixels: Vec<u8>,
}

impl PixelCanvas {
    /// Creates a transparent canvas of the provided size.
    #[must_use]
    pub fn new(size: UVec2) -> Self {
        Self {
            size,
            pixels: vec![0; Self::byte_len(size)],
        }
    }

    fn byte_len(size: UVec2) -> usize {
        size.x as usize * size.y as usize * 4
    }

    /// Width of the canvas in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.size.x
    }

    /// Height of the canvas in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.size.y
    }

    /// Row-major RGBA bytes.
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA value of a single pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.x || y >= self.size.y {
            return None;
        }
        let start = (y as usize * self.size.x as usize + x as usize) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[start..start + 4]);
        Some(rgba)
    }

    /// Writes the canvas as a binary PPM (P6) image, dropping alpha.
    pub fn write_ppm<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "P6\n{} {}\n255\n", self.size.x, self.size.y)?;
        for pixel in self.pixels.chunks_exact(4) {
            writer.write_all(&pixel[..3])?;
        }
        writer.flush()
    }
}

impl Surface for PixelCanvas {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn resize(&mut self, size: UVec2) {
        self.size = size;
        self.pixels.clear();
        self.pixels.resize(Self::byte_len(size), 0);
    }

    fn fill_rect(&mut self, origin: UVec2, size: UVec2, color: Color) {
        let rgba = color.to_rgba_u8();
        let end = (origin + size).min(self.size);
        let width = self.size.x as usize;
        for y in origin.y..end.y {
            for x in origin.x..end.x {
                let start = (y as usize * width + x as usize) * 4;
                self.pixels[start..start + 4].copy_from_slice(&rgba);
            }
        }
    }
}
