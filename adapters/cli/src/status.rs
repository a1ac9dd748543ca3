//! Folds controller events into the status shown next to the canvas.

use flowmap_core::{PlaybackEvent, PlaybackMode};
use flowmap_rendering::PlaybackStatus;

/// Applies `events` in order to `status`.
///
/// Returns `true` when any event implies a newly presented frame.
pub(crate) fn track(status: &mut PlaybackStatus, events: &[PlaybackEvent]) -> bool {
    let mut repainted = false;
    for event in events {
        match *event {
            PlaybackEvent::Resumed => {
                status.mode = PlaybackMode::Running;
                status.pause_reason = None;
            }
            PlaybackEvent::Ticked { tick, metrics } => {
                status.tick = tick;
                status.metrics = metrics;
                repainted = true;
            }
            PlaybackEvent::Paused { reason } => {
                status.mode = PlaybackMode::Paused;
                status.pause_reason = Some(reason);
            }
            PlaybackEvent::Restarted => repainted = true,
        }
    }
    repainted
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmap_core::{FlowMetrics, PauseReason};

    #[test]
    fn ticks_update_counters_and_request_a_repaint() {
        let mut status = PlaybackStatus::default();
        let repainted = track(
            &mut status,
            &[
                PlaybackEvent::Resumed,
                PlaybackEvent::Ticked {
                    tick: 3,
                    metrics: FlowMetrics::new(9, 1),
                },
            ],
        );

        assert!(repainted);
        assert_eq!(status.mode, PlaybackMode::Running);
        assert_eq!(status.tick, 3);
        assert_eq!(status.metrics, FlowMetrics::new(9, 1));
    }

    #[test]
    fn pause_records_its_reason_until_resumed() {
        let mut status = PlaybackStatus::default();
        assert!(!track(
            &mut status,
            &[PlaybackEvent::Paused {
                reason: PauseReason::SteadyState,
            }],
        ));
        assert_eq!(status.pause_reason, Some(PauseReason::SteadyState));

        let _ = track(&mut status, &[PlaybackEvent::Resumed]);
        assert_eq!(status.pause_reason, None);
    }

    #[test]
    fn restart_repaints_without_touching_counters() {
        let mut status = PlaybackStatus {
            tick: 4,
            ..PlaybackStatus::default()
        };
        assert!(track(&mut status, &[PlaybackEvent::Restarted]));
        assert_eq!(status.tick, 4);
    }
}
