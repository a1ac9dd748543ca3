//! Immediate-mode UI helpers for the Macroquad rendering backend.
//!
//! This module hosts all uses of `macroquad::ui` so the rest of the adapter can
//! remain agnostic of Macroquad's UI types.

use flowmap_core::{PauseReason, PlaybackMode};
use flowmap_rendering::PlaybackStatus;
use macroquad::{
    color::{Color, WHITE},
    math::{RectOffset, Vec2},
    ui::{hash, Ui},
};

/// Buttons pressed in the control panel during the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ControlPanelUiResult {
    /// The play/pause button was pressed.
    pub(crate) toggle_play: bool,
    /// The step button was pressed.
    pub(crate) step: bool,
    /// The restart button was pressed.
    pub(crate) restart: bool,
}

/// Snapshot of the control panel's UI layout and data for the current frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ControlPanelUiContext {
    /// Top-left corner of the panel in screen coordinates.
    pub(crate) origin: Vec2,
    /// Panel dimensions in screen space.
    pub(crate) size: Vec2,
    /// Background colour applied to the window skin so the UI matches the
    /// adapter's solid rectangle.
    pub(crate) background: Color,
    /// Playback state shown as labels.
    pub(crate) status: PlaybackStatus,
}

/// Renders the control panel's labels and buttons for the current frame.
pub(crate) fn draw_control_panel_ui(
    ui: &mut Ui,
    context: ControlPanelUiContext,
) -> ControlPanelUiResult {
    let mut skin = ui.default_skin();
    skin.margin = 0.0;

    let window_style = ui
        .style_builder()
        .color(context.background)
        .color_hovered(context.background)
        .color_clicked(context.background)
        .color_selected(context.background)
        .color_selected_hovered(context.background)
        .color_inactive(context.background)
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(16.0, 16.0, 16.0, 16.0))
        .build();
    skin.window_style = window_style;

    let label_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(0.0, 0.0, 4.0, 4.0))
        .build();
    skin.label_style = label_style;

    let button_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .color(Color::from_rgba(70, 70, 70, 255))
        .color_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_clicked(Color::from_rgba(56, 56, 56, 255))
        .color_selected(Color::from_rgba(70, 70, 70, 255))
        .color_selected_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_inactive(Color::from_rgba(56, 56, 56, 200))
        .margin(RectOffset::new(0.0, 0.0, 8.0, 8.0))
        .build();
    skin.button_style = button_style;

    ui.push_skin(&skin);

    let mut result = ControlPanelUiResult::default();
    let status = context.status;
    let _ = ui.window(hash!("control_panel"), context.origin, context.size, |ui| {
        ui.label(None, mode_label(status.mode, status.pause_reason));
        ui.label(None, &format!("Tick: {}", status.tick));
        ui.label(None, &format!("Water: {}", status.metrics.total_water));
        ui.label(None, &format!("Flowing: {}", status.metrics.total_flowing));

        let play_label = match status.mode {
            PlaybackMode::Running => "Pause",
            PlaybackMode::Paused => "Play",
        };
        result.toggle_play = ui.button(None, play_label);
        result.step = ui.button(None, "Step");
        result.restart = ui.button(None, "Restart");

        ui.label(None, "Space: play/pause");
        ui.label(None, "S or Right: step");
        ui.label(None, "R: restart, Q: quit");
    });

    ui.pop_skin();
    result
}

fn mode_label(mode: PlaybackMode, reason: Option<PauseReason>) -> &'static str {
    match (mode, reason) {
        (PlaybackMode::Running, _) => "Running",
        (PlaybackMode::Paused, Some(PauseReason::SteadyState)) => "Paused: steady state",
        (PlaybackMode::Paused, Some(PauseReason::Failed)) => "Paused: frame failed",
        (PlaybackMode::Paused, _) => "Paused",
    }
}
