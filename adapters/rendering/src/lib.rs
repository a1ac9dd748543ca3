#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Flowmap adapters.

mod canvas;
mod renderer;

use anyhow::Result as AnyResult;
use flowmap_core::{CellState, FlowMetrics, PauseReason, PlaybackCommand, PlaybackMode};

pub use canvas::{CanvasLayout, PixelCanvas, Surface};
pub use renderer::{RenderError, Renderer};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Converts the color to byte RGBA channels.
    #[must_use]
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [
            channel_to_u8(self.red),
            channel_to_u8(self.green),
            channel_to_u8(self.blue),
            channel_to_u8(self.alpha),
        ]
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

fn channel_to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Color of cells marked as streams without standing water.
pub const STREAM_COLOR: Color = Color::from_rgb_u8(0, 250, 242);

/// Color of the one-pixel lines separating cells.
pub const GRID_LINE_COLOR: Color = Color::from_rgb_u8(0x1e, 0x1e, 0x1e);

/// Maps a decoded cell to its fill color.
///
/// Standing water wins over the stream marker, which wins over bare land.
/// Deeper water is drawn darker; higher land is drawn brighter.
#[must_use]
pub fn cell_color(cell: CellState) -> Color {
    if cell.water_level > 0 {
        let blue = doubled_channel(u8::MAX - cell.water_level);
        Color::from_rgb_u8(0, 0, blue)
    } else if cell.is_stream {
        STREAM_COLOR
    } else {
        Color::from_rgb_u8(0, doubled_channel(cell.land_level), 0)
    }
}

fn doubled_channel(level: u8) -> u8 {
    level.saturating_mul(2)
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    /// Playback commands requested since the previous frame, in order.
    pub commands: Vec<PlaybackCommand>,
}

/// Observable playback state shown next to the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackStatus {
    /// Current playback mode.
    pub mode: PlaybackMode,
    /// Ticks performed since startup.
    pub tick: u64,
    /// Metrics of the most recent frame.
    pub metrics: FlowMetrics,
    /// Why playback last paused, if it has.
    pub pause_reason: Option<PauseReason>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Paused,
            tick: 0,
            metrics: FlowMetrics::default(),
            pause_reason: None,
        }
    }
}

/// Scene description combining the painted canvas with playback status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    /// Latest painted frame.
    pub canvas: PixelCanvas,
    /// Playback state displayed in the control panel.
    pub status: PlaybackStatus,
}

impl Scene {
    /// Creates a new scene description.
    #[must_use]
    pub fn new(canvas: PixelCanvas, status: PlaybackStatus) -> Self {
        Self { canvas, status }
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting Flowmap scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the input captured during
    /// the frame and refreshes the scene before it is drawn. Errors returned
    /// by the closure stop the backend and are propagated.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(FrameInput, &mut Scene) -> AnyResult<()> + 'static;
}
