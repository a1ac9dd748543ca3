#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure quantization system that turns raw elevation samples into engine levels.
//!
//! Only the relative shape of the terrain matters to the engine, so samples
//! are rounded to whole units and shifted so the lowest cell sits at level 0.

use flowmap_core::{ElevationGrid, GridError, RasterSamples};
use thiserror::Error;

/// Outcome of quantizing a sample window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quantized {
    /// Zero-based levels ready for engine construction.
    pub grid: ElevationGrid,
    /// Rounded raw elevation that maps to level 0.
    pub base_level: i64,
    /// Number of cells whose relative level exceeded 255 and was clamped.
    pub clamped_cells: usize,
}

/// Failures reported while quantizing samples.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum QuantizeError {
    /// The sample window held no values.
    #[error("raster window contained no samples")]
    EmptyRaster,
    /// A sample was NaN or infinite.
    #[error("sample {index} is not finite ({value})")]
    NonFiniteSample {
        /// Row-major index of the offending sample.
        index: usize,
        /// Offending value.
        value: f64,
    },
    /// The quantized levels could not form a grid.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Rounds, rebases and packs samples into an [`ElevationGrid`].
///
/// Halves round towards positive infinity. Relative levels above 255 are
/// clamped and counted in [`Quantized::clamped_cells`].
pub fn quantize(samples: &RasterSamples) -> Result<Quantized, QuantizeError> {
    if samples.is_empty() {
        return Err(QuantizeError::EmptyRaster);
    }

    let rounded = samples
        .values()
        .iter()
        .enumerate()
        .map(|(index, &value)| round_sample(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    let base_level = match rounded.iter().copied().min() {
        Some(minimum) => minimum,
        None => return Err(QuantizeError::EmptyRaster),
    };

    let mut clamped_cells = 0;
    let levels = rounded
        .iter()
        .map(|&level| {
            // Rounding saturates huge samples at the i64 bounds.
            let relative = level.saturating_sub(base_level);
            match u8::try_from(relative) {
                Ok(level) => level,
                Err(_) => {
                    clamped_cells += 1;
                    u8::MAX
                }
            }
        })
        .collect();

    if clamped_cells > 0 {
        log::warn!(
            "{clamped_cells} cells rose more than {} units above the base level {base_level} and were clamped",
            u8::MAX
        );
    }

    let grid = ElevationGrid::from_levels(samples.dimensions(), levels)?;
    Ok(Quantized {
        grid,
        base_level,
        clamped_cells,
    })
}

fn round_sample(index: usize, value: f64) -> Result<i64, QuantizeError> {
    if !value.is_finite() {
        return Err(QuantizeError::NonFiniteSample { index, value });
    }
    Ok((value + 0.5).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmap_core::GridDimensions;

    fn samples(width: u32, height: u32, values: Vec<f64>) -> RasterSamples {
        RasterSamples::new(GridDimensions::new(width, height), values).expect("valid samples")
    }

    #[test]
    fn halves_round_upwards() {
        assert_eq!(round_sample(0, 2.5), Ok(3));
        assert_eq!(round_sample(0, -2.5), Ok(-2));
        assert_eq!(round_sample(0, 2.49), Ok(2));
        assert_eq!(round_sample(0, -0.2), Ok(0));
    }

    #[test]
    fn empty_windows_are_rejected_before_rebasing() {
        let empty = samples(0, 0, Vec::new());
        assert_eq!(quantize(&empty), Err(QuantizeError::EmptyRaster));
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let window = samples(3, 1, vec![1.0, f64::NAN, 3.0]);
        assert!(matches!(
            quantize(&window),
            Err(QuantizeError::NonFiniteSample { index: 1, .. })
        ));
    }

    #[test]
    fn tall_relief_is_clamped() {
        let window = samples(3, 1, vec![100.0, 355.0, 400.2]);
        let quantized = quantize(&window).expect("finite samples");
        assert_eq!(quantized.grid.levels(), &[0, 255, 255]);
        assert_eq!(quantized.clamped_cells, 1);
        assert_eq!(quantized.base_level, 100);
    }

    #[test]
    fn extreme_relief_saturates_into_the_clamp() {
        let window = samples(2, 1, vec![f64::from(f32::MIN), 100.0]);
        let quantized = quantize(&window).expect("finite samples");
        assert_eq!(quantized.base_level, i64::MIN);
        assert_eq!(quantized.grid.levels(), &[0, 255]);
        assert_eq!(quantized.clamped_cells, 1);

        let window = samples(2, 1, vec![-1e19, 1e19]);
        let quantized = quantize(&window).expect("finite samples");
        assert_eq!(quantized.base_level, i64::MIN);
        assert_eq!(quantized.grid.levels(), &[0, 255]);
        assert_eq!(quantized.clamped_cells, 1);
    }

    #[test]
    fn negative_elevations_rebase_to_zero() {
        let window = samples(2, 2, vec![-10.4, -3.6, 0.0, 7.5]);
        let quantized = quantize(&window).expect("finite samples");
        assert_eq!(quantized.base_level, -10);
        assert_eq!(quantized.grid.levels(), &[0, 6, 10, 18]);
    }
}
