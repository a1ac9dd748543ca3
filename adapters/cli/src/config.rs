//! Command-line flags and the `flowmap.toml` configuration file.
//!
//! File values fill in anything the command line leaves unset, and built-in
//! defaults fill in anything the file leaves unset.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use flowmap_core::{CellCoord, ElevationWindow};
use flowmap_raster::SourceLocation;
use serde::Deserialize;

/// Configuration file read when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "flowmap.toml";

/// Animates water flowing across a quantized elevation raster.
#[derive(Debug, Parser)]
#[command(name = "flowmap", version)]
#[command(about = "Animates water flowing across a quantized elevation raster")]
pub(crate) struct Cli {
    /// Configuration file; `flowmap.toml` is used when present.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// GeoTIFF path or http(s) URL to read elevations from.
    #[arg(long)]
    pub(crate) source: Option<String>,

    /// Raster window to simulate, as LEFT,TOP,WIDTH,HEIGHT.
    #[arg(long, value_parser = parse_window)]
    pub(crate) window: Option<WindowConfig>,

    /// Display size of a single cell in pixels.
    #[arg(long)]
    pub(crate) cell_size: Option<u32>,

    /// Seeds a water source at ROW,COL relative to the window; repeatable.
    #[arg(long = "stream", value_parser = parse_cell)]
    pub(crate) streams: Vec<CellCoord>,

    /// Runs without a window and prints a summary once playback halts.
    #[arg(long)]
    pub(crate) headless: bool,

    /// Stops a headless run after this many ticks.
    #[arg(long, requires = "headless")]
    pub(crate) max_ticks: Option<u64>,

    /// Format of the headless summary.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub(crate) report: ReportFormat,

    /// Writes the final headless canvas to this path as a binary PPM image.
    #[arg(long, requires = "headless")]
    pub(crate) snapshot: Option<PathBuf>,
}

/// Output format of the headless summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReportFormat {
    /// Human-readable lines.
    Text,
    /// A single JSON object.
    Json,
}

/// Raster window as written in the configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WindowConfig {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            left: 50,
            top: 10,
            width: 100,
            height: 50,
        }
    }
}

impl WindowConfig {
    fn validate(self) -> Result<ElevationWindow> {
        ElevationWindow::new(self.left, self.top, self.width, self.height)
            .context("invalid raster window")
    }
}

/// Window-mode presentation options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DisplayConfig {
    /// Synchronises presentation with the display refresh rate.
    pub(crate) vsync: bool,
    /// Logs the frame rate once per second.
    pub(crate) show_fps: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            show_fps: false,
        }
    }
}

/// Contents of `flowmap.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    source: String,
    cell_size: u32,
    window: WindowConfig,
    sources: Vec<CellCoord>,
    display: DisplayConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            source: "output_hh.tif".to_owned(),
            cell_size: 2,
            window: WindowConfig::default(),
            sources: vec![CellCoord::new(39, 45)],
            display: DisplayConfig::default(),
        }
    }
}

impl FileConfig {
    /// Parses configuration file contents.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse flowmap configuration toml contents")
    }

    /// Reads the explicitly requested file, or the default file when it exists.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    log::debug!("no {DEFAULT_CONFIG_PATH} found, using built-in defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration at {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Fully resolved run configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Settings {
    /// Where the elevation raster is read from.
    pub(crate) source: SourceLocation,
    /// Raster window to simulate.
    pub(crate) window: ElevationWindow,
    /// Display size of a single cell in pixels.
    pub(crate) cell_size: u32,
    /// Seeded water sources.
    pub(crate) sources: Vec<CellCoord>,
    /// Window-mode presentation options.
    pub(crate) display: DisplayConfig,
}

impl Settings {
    /// Overlays command-line flags on file values and validates the result.
    pub(crate) fn resolve(file: FileConfig, cli: &Cli) -> Result<Self> {
        let source = cli.source.clone().unwrap_or(file.source);
        if source.trim().is_empty() {
            bail!("raster source must not be empty");
        }
        let window = cli.window.unwrap_or(file.window).validate()?;
        let cell_size = cli.cell_size.unwrap_or(file.cell_size);
        if cell_size == 0 {
            bail!("cell size must be positive");
        }
        let sources = if cli.streams.is_empty() {
            file.sources
        } else {
            cli.streams.clone()
        };

        Ok(Self {
            source: SourceLocation::parse(&source),
            window,
            cell_size,
            sources,
            display: file.display,
        })
    }
}

fn parse_numbers<const N: usize>(value: &str, shape: &str) -> Result<[u32; N], String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {shape}, got `{value}`"));
    }
    let mut numbers = [0; N];
    for (slot, part) in numbers.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("`{part}` is not a non-negative integer"))?;
    }
    Ok(numbers)
}

fn parse_window(value: &str) -> Result<WindowConfig, String> {
    let [left, top, width, height] = parse_numbers(value, "LEFT,TOP,WIDTH,HEIGHT")?;
    Ok(WindowConfig {
        left,
        top,
        width,
        height,
    })
}

fn parse_cell(value: &str) -> Result<CellCoord, String> {
    let [row, column] = parse_numbers(value, "ROW,COL")?;
    Ok(CellCoord::new(row, column))
}
