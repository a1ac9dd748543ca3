//! Windowed reads from an in-memory GeoTIFF.

use std::io::Cursor;

use flowmap_core::{ElevationWindow, GridDimensions, RasterError, RasterSamples, RasterSource};
use tiff::decoder::{Decoder, DecodingResult};

use crate::error::FormatError;

/// Single-band GeoTIFF held in memory.
///
/// Only the strips or tiles intersecting a requested window are decoded.
/// Georeferencing tags are ignored; windows are expressed in pixels.
#[derive(Clone, Debug)]
pub struct GeoTiffRaster {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    chunk_width: u32,
    chunk_height: u32,
}

impl GeoTiffRaster {
    /// Reads the layout of the first image in a TIFF file.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RasterError> {
        let [width, height, chunk_width, chunk_height] = read_layout(&bytes)?;
        Ok(Self {
            bytes,
            width,
            height,
            chunk_width,
            chunk_height,
        })
    }

    /// Size of the encoded file in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }
}

fn read_layout(bytes: &[u8]) -> Result<[u32; 4], FormatError> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;
    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    let color = decoder.colortype()?;
    log::debug!("parsed {width}x{height} raster: {color:?} in {chunk_width}x{chunk_height} chunks");
    Ok([width, height, chunk_width, chunk_height])
}

/// Decoded first-band values of one strip or tile.
struct Chunk {
    width: usize,
    samples_per_pixel: usize,
    values: Vec<f64>,
}

impl Chunk {
    fn read(decoder: &mut Decoder<Cursor<&[u8]>>, index: u32) -> Result<Self, FormatError> {
        let (width, height) = decoder.chunk_data_dimensions(index);
        let values = samples(decoder.read_chunk(index)?);
        let pixels = width as usize * height as usize;
        if pixels == 0 || values.len() < pixels || values.len() % pixels != 0 {
            return Err(FormatError::ChunkSize {
                chunk: index,
                samples: values.len(),
                pixels,
            });
        }
        Ok(Self {
            width: width as usize,
            samples_per_pixel: values.len() / pixels,
            values,
        })
    }

    fn value(&self, row: usize, column: usize) -> f64 {
        self.values[(row * self.width + column) * self.samples_per_pixel]
    }
}

fn samples(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
    }
}

impl RasterSource for GeoTiffRaster {
    fn extent(&self) -> GridDimensions {
        GridDimensions::new(self.width, self.height)
    }

    fn read_window(&self, window: ElevationWindow) -> Result<RasterSamples, RasterError> {
        let extent = self.extent();
        if !window.fits_within(extent) {
            return Err(RasterError::WindowOutOfBounds { window, extent });
        }

        let mut decoder =
            Decoder::new(Cursor::new(self.bytes.as_slice())).map_err(FormatError::from)?;
        let dimensions = window.dimensions();
        let window_width = dimensions.width() as usize;
        let mut values = vec![0.0; dimensions.cell_count()];

        let first_chunk_row = window.top() / self.chunk_height;
        let last_chunk_row = (window.bottom() - 1) / self.chunk_height;
        let first_chunk_column = window.left() / self.chunk_width;
        let last_chunk_column = (window.right() - 1) / self.chunk_width;

        for chunk_row in first_chunk_row..=last_chunk_row {
            for chunk_column in first_chunk_column..=last_chunk_column {
                let index = chunk_row * self.chunks_across() + chunk_column;
                let chunk = Chunk::read(&mut decoder, index)?;

                let chunk_top = chunk_row * self.chunk_height;
                let chunk_left = chunk_column * self.chunk_width;
                let rows = window.top().max(chunk_top)
                    ..window.bottom().min(chunk_top + self.chunk_height);
                let columns = window.left().max(chunk_left)
                    ..window.right().min(chunk_left + self.chunk_width);

                for row in rows {
                    let local_row = (row - chunk_top) as usize;
                    let out_row = (row - window.top()) as usize;
                    for column in columns.clone() {
                        let local_column = (column - chunk_left) as usize;
                        let out_column = (column - window.left()) as usize;
                        values[out_row * window_width + out_column] =
                            chunk.value(local_row, local_column);
                    }
                }
            }
        }

        RasterSamples::new(dimensions, values)
            .map_err(|error| RasterError::MalformedRaster(error.to_string()))
    }
}
