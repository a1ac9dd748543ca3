//! Format errors raised while interpreting TIFF bytes.

use flowmap_core::RasterError;
use thiserror::Error;
use tiff::TiffError;

/// Reasons a byte buffer cannot be read as a single-band GeoTIFF.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The TIFF decoder rejected the file or one of its chunks.
    #[error("invalid TIFF data: {0}")]
    Tiff(#[from] TiffError),
    /// A decoded chunk does not hold a whole number of pixels.
    #[error("chunk {chunk} decoded to {samples} samples, not a multiple of its {pixels} pixels")]
    ChunkSize {
        /// Chunk index.
        chunk: u32,
        /// Samples produced by the decoder.
        samples: usize,
        /// Pixels covered by the chunk.
        pixels: usize,
    },
}

impl From<FormatError> for RasterError {
    fn from(error: FormatError) -> Self {
        RasterError::MalformedRaster(error.to_string())
    }
}
