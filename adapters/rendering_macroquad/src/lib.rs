#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for Flowmap.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! The painted [`PixelCanvas`] is uploaded as a texture every frame and drawn
//! with nearest filtering so each grid line stays one crisp pixel wide. All
//! UI-specific calls live inside the local `ui` module.

mod ui;

use self::ui::{draw_control_panel_ui, ControlPanelUiContext, ControlPanelUiResult};
use anyhow::Result;
use flowmap_core::PlaybackCommand;
use flowmap_rendering::{Color, FrameInput, PixelCanvas, Presentation, RenderingBackend, Scene};
use macroquad::{
    input::{is_key_pressed, KeyCode},
    math::Vec2,
    texture::{draw_texture_ex, DrawTextureParams, FilterMode, Image, Texture2D},
};
use std::{sync::mpsc, time::Duration};

/// Width of the control panel drawn to the right of the canvas.
const CONTROL_PANEL_WIDTH: f32 = 220.0;

/// Tracks UI-sourced interactions so they can be merged with physical input on the next frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlPanelInputState {
    toggle_play_latched: bool,
    step_latched: bool,
    restart_latched: bool,
}

impl ControlPanelInputState {
    /// Returns whether the UI requested play/pause and clears the latch so the
    /// action fires only once.
    pub fn take_toggle_play(&mut self) -> bool {
        std::mem::take(&mut self.toggle_play_latched)
    }

    /// Records that the play/pause button was pressed this frame.
    pub fn register_toggle_play(&mut self) {
        self.toggle_play_latched = true;
    }

    /// Returns whether the UI requested a single step, clearing the latch.
    pub fn take_step(&mut self) -> bool {
        std::mem::take(&mut self.step_latched)
    }

    /// Records that the step button was pressed this frame.
    pub fn register_step(&mut self) {
        self.step_latched = true;
    }

    /// Returns whether the UI requested a restart, clearing the latch.
    pub fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart_latched)
    }

    /// Records that the restart button was pressed this frame.
    pub fn register_restart(&mut self) {
        self.restart_latched = true;
    }

    /// Drains every latched press as playback commands.
    ///
    /// Commands are ordered play/pause, step, restart.
    pub fn take_commands(&mut self) -> Vec<PlaybackCommand> {
        let mut commands = Vec::new();
        if self.take_toggle_play() {
            commands.push(PlaybackCommand::TogglePlay);
        }
        if self.take_step() {
            commands.push(PlaybackCommand::Step);
        }
        if self.take_restart() {
            commands.push(PlaybackCommand::Restart);
        }
        commands
    }

    fn register(&mut self, pressed: ControlPanelUiResult) {
        if pressed.toggle_play {
            self.register_toggle_play();
        }
        if pressed.step {
            self.register_step();
        }
        if pressed.restart {
            self.register_restart();
        }
    }
}

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
    /// `Space` plays or pauses.
    toggle_play: bool,
    /// `S` or `Right` runs a single cycle.
    step: bool,
    /// `R` restarts the simulation.
    restart: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            toggle_play: is_key_pressed(KeyCode::Space),
            step: is_key_pressed(KeyCode::S) || is_key_pressed(KeyCode::Right),
            restart: is_key_pressed(KeyCode::R),
        }
    }

    fn commands(self) -> impl Iterator<Item = PlaybackCommand> {
        [
            (self.toggle_play, PlaybackCommand::TogglePlay),
            (self.step, PlaybackCommand::Step),
            (self.restart, PlaybackCommand::Restart),
        ]
        .into_iter()
        .filter_map(|(pressed, command)| pressed.then_some(command))
    }
}

fn gather_frame_input(
    control_panel: &mut ControlPanelInputState,
    keyboard: KeyboardShortcuts,
) -> FrameInput {
    let mut commands = control_panel.take_commands();
    commands.extend(keyboard.commands());
    FrameInput { commands }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs frame rate once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }
}

/// Tracks the average frames-per-second produced by the render loop.
#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
}

impl FpsCounter {
    /// Records a rendered frame and returns the average rate once a second has elapsed.
    fn record_frame(&mut self, frame: Duration) -> Option<f32> {
        self.elapsed += frame;
        self.frames = self.frames.saturating_add(1);
        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let per_second = self.frames as f32 / self.elapsed.as_secs_f32();
        self.elapsed = Duration::ZERO;
        self.frames = 0;
        Some(per_second)
    }
}

/// Smallest panel height that fits every control panel widget.
const MIN_WINDOW_HEIGHT: u32 = 400;

/// Initial window size fitting the canvas next to the control panel.
fn window_size(canvas: &PixelCanvas) -> (i32, i32) {
    let width = canvas.width().saturating_add(CONTROL_PANEL_WIDTH as u32);
    let height = canvas.height().max(MIN_WINDOW_HEIGHT);
    (
        i32::try_from(width).unwrap_or(i32::MAX),
        i32::try_from(height).unwrap_or(i32::MAX),
    )
}

/// Screen rectangle the canvas texture is drawn into.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CanvasPlacement {
    origin: Vec2,
    size: Vec2,
}

/// Centres the canvas in the available area, scaled by the largest whole
/// factor that fits so grid lines keep a uniform width.
fn canvas_placement(
    canvas_width: u32,
    canvas_height: u32,
    available: Vec2,
) -> Option<CanvasPlacement> {
    if canvas_width == 0 || canvas_height == 0 {
        return None;
    }

    let width = canvas_width as f32;
    let height = canvas_height as f32;
    let fit = (available.x / width).min(available.y / height).floor();
    let scale = fit.max(1.0);
    let size = Vec2::new(width * scale, height * scale);
    let origin = ((available - size) * 0.5).max(Vec2::ZERO);
    Some(CanvasPlacement { origin, size })
}

/// GPU copy of the most recently painted canvas.
#[derive(Debug, Default)]
struct CanvasTexture {
    texture: Option<(Texture2D, u32, u32)>,
}

impl CanvasTexture {
    fn upload(&mut self, canvas: &PixelCanvas) -> Option<Texture2D> {
        let (width, height) = (canvas.width(), canvas.height());
        let (Ok(short_width), Ok(short_height)) = (u16::try_from(width), u16::try_from(height))
        else {
            log::warn!("canvas of {width}x{height} pixels exceeds the texture size limit");
            return None;
        };
        if short_width == 0 || short_height == 0 {
            return None;
        }

        match self.texture {
            Some((texture, cached_width, cached_height))
                if cached_width == width && cached_height == height =>
            {
                texture.update(&Image {
                    bytes: canvas.rgba().to_vec(),
                    width: short_width,
                    height: short_height,
                });
                Some(texture)
            }
            _ => {
                if let Some((stale, _, _)) = self.texture.take() {
                    stale.delete();
                }
                let texture = Texture2D::from_rgba8(short_width, short_height, canvas.rgba());
                texture.set_filter(FilterMode::Nearest);
                self.texture = Some((texture, width, height));
                Some(texture)
            }
        }
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(FrameInput, &mut Scene) -> Result<()> + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let (window_width, window_height) = window_size(&scene.canvas);
        let mut config = macroquad::window::Conf {
            window_title,
            window_width,
            window_height,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        let (result_sender, result_receiver) = mpsc::channel::<Result<()>>();

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let panel_background = to_macroquad_color(clear_color.lighten(0.1));
            let mut fps_counter = FpsCounter::default();
            let mut control_panel_input = ControlPanelInputState::default();
            let mut canvas_texture = CanvasTexture::default();

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    break;
                }

                let frame_input = gather_frame_input(&mut control_panel_input, keyboard);
                if let Err(error) = update_scene(frame_input, &mut scene) {
                    let _ = result_sender.send(Err(error));
                    return;
                }

                macroquad::window::clear_background(background);

                let screen_width = macroquad::window::screen_width();
                let screen_height = macroquad::window::screen_height();
                let panel_left = (screen_width - CONTROL_PANEL_WIDTH).max(0.0);

                if let Some(placement) = canvas_placement(
                    scene.canvas.width(),
                    scene.canvas.height(),
                    Vec2::new(panel_left, screen_height),
                ) {
                    if let Some(texture) = canvas_texture.upload(&scene.canvas) {
                        draw_texture_ex(
                            texture,
                            placement.origin.x,
                            placement.origin.y,
                            macroquad::color::WHITE,
                            DrawTextureParams {
                                dest_size: Some(placement.size),
                                ..Default::default()
                            },
                        );
                    }
                }

                macroquad::shapes::draw_rectangle(
                    panel_left,
                    0.0,
                    CONTROL_PANEL_WIDTH,
                    screen_height,
                    panel_background,
                );
                let mut control_panel_ui = macroquad::ui::root_ui();
                let pressed = draw_control_panel_ui(
                    &mut control_panel_ui,
                    ControlPanelUiContext {
                        origin: Vec2::new(panel_left, 0.0),
                        size: Vec2::new(CONTROL_PANEL_WIDTH, screen_height),
                        background: panel_background,
                        status: scene.status,
                    },
                );
                drop(control_panel_ui);
                control_panel_input.register(pressed);

                let frame_time =
                    Duration::from_secs_f32(macroquad::time::get_frame_time().max(0.0));
                if let Some(per_second) = fps_counter.record_frame(frame_time) {
                    if show_fps {
                        log::info!("FPS: {per_second:.2}");
                    }
                }

                macroquad::window::next_frame().await;
            }

            let _ = result_sender.send(Ok(()));
        });

        result_receiver.recv().unwrap_or_else(|_| Ok(()))?;

        Ok(())
    }
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_commands_follow_a_fixed_order() {
        let keyboard = KeyboardShortcuts {
            quit_requested: false,
            toggle_play: true,
            step: true,
            restart: true,
        };
        let commands: Vec<_> = keyboard.commands().collect();
        assert_eq!(
            commands,
            vec![
                PlaybackCommand::TogglePlay,
                PlaybackCommand::Step,
                PlaybackCommand::Restart,
            ]
        );
    }

    #[test]
    fn frame_input_lists_panel_presses_before_keys() {
        let mut panel = ControlPanelInputState::default();
        panel.register(ControlPanelUiResult {
            toggle_play: false,
            step: false,
            restart: true,
        });
        let keyboard = KeyboardShortcuts {
            toggle_play: true,
            ..KeyboardShortcuts::default()
        };

        let input = gather_frame_input(&mut panel, keyboard);
        assert_eq!(
            input.commands,
            vec![PlaybackCommand::Restart, PlaybackCommand::TogglePlay]
        );
        assert!(
            gather_frame_input(&mut panel, KeyboardShortcuts::default())
                .commands
                .is_empty(),
            "latches clear once taken"
        );
    }

    #[test]
    fn canvas_scales_by_whole_factors() {
        let placement =
            canvas_placement(301, 151, Vec2::new(740.0, 640.0)).expect("non-empty canvas");
        assert_eq!(placement.size, Vec2::new(602.0, 302.0));
        assert_eq!(placement.origin, Vec2::new(69.0, 169.0));
    }

    #[test]
    fn oversized_canvas_is_drawn_unscaled_from_the_corner() {
        let placement =
            canvas_placement(1001, 801, Vec2::new(740.0, 640.0)).expect("non-empty canvas");
        assert_eq!(placement.size, Vec2::new(1001.0, 801.0));
        assert_eq!(placement.origin, Vec2::ZERO);
    }

    #[test]
    fn window_fits_canvas_and_panel() {
        let canvas = PixelCanvas::new(glam::UVec2::new(301, 151));
        assert_eq!(window_size(&canvas), (521, 400));
        let tall = PixelCanvas::new(glam::UVec2::new(10, 900));
        assert_eq!(window_size(&tall), (230, 900));
    }

    #[test]
    fn empty_canvas_has_no_placement() {
        assert_eq!(canvas_placement(0, 10, Vec2::new(100.0, 100.0)), None);
    }

    #[test]
    fn fps_counter_reports_once_per_second() {
        let mut counter = FpsCounter::default();
        let frame = Duration::from_millis(250);
        assert_eq!(counter.record_frame(frame), None);
        assert_eq!(counter.record_frame(frame), None);
        assert_eq!(counter.record_frame(frame), None);
        let rate = counter.record_frame(frame).expect("a full second elapsed");
        assert!((rate - 4.0).abs() < 1e-3, "unexpected rate {rate}");
        assert_eq!(counter.record_frame(frame), None);
    }

    #[test]
    fn colors_convert_channel_for_channel() {
        let converted = to_macroquad_color(Color::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(converted, macroquad::color::Color::new(0.1, 0.2, 0.3, 0.4));
    }
}
