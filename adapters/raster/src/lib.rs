#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! GeoTIFF raster loader for Flowmap.
//!
//! Rasters are fetched whole from a local path, a `file://` URL or an HTTP
//! URL, decoded with the `tiff` crate and served window by window through
//! [`RasterSource`]. Only the first band of the first image is read.

mod error;
mod fetch;
mod geotiff;

use flowmap_core::{RasterError, RasterSource};

pub use error::FormatError;
pub use fetch::{fetch, SourceLocation};
pub use geotiff::GeoTiffRaster;

/// Fetches and parses the raster at `location`.
pub async fn open(location: &SourceLocation) -> Result<GeoTiffRaster, RasterError> {
    let bytes = fetch(location).await?;
    let raster = GeoTiffRaster::from_bytes(bytes)?;
    let extent = raster.extent();
    log::info!(
        "raster loaded from {location}: {}x{} pixels, {} bytes",
        extent.width(),
        extent.height(),
        raster.byte_len()
    );
    Ok(raster)
}
