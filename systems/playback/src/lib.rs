#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Playback controller coordinating ticks, frame presentation and user controls.
//!
//! The controller owns the engine, the scheduler and the frame sink. A cycle
//! ticks the engine, decodes the packed frame and presents it. While running,
//! each cycle is driven by a [`FrameTicket`]; only the ticket recorded as
//! pending is honoured, so callbacks that arrive after a pause or restart are
//! ignored.

mod scheduler;

use std::mem;

use flowmap_core::{
    Engine, FlowMetrics, FrameSink, PauseReason, PlaybackCommand, PlaybackEvent, PlaybackMode,
};
use thiserror::Error;

pub use scheduler::{FrameScheduler, FrameTicket, Scheduler};

/// Flowing count that marks a single-source simulation.
const STEADY_FLOWING_COUNT: u64 = 1;

/// Failures raised while running a playback cycle.
#[derive(Debug, PartialEq, Error)]
pub enum PlaybackError<E>
where
    E: std::error::Error + 'static,
{
    /// The engine produced a frame that could not be decoded.
    #[error("failed to decode engine frame")]
    Decode(#[from] flowmap_core::DecodeError),
    /// The sink rejected the decoded frame.
    #[error("failed to present frame")]
    Present(#[source] E),
}

/// Result alias for playback operations that present frames through `F`.
pub type PlaybackResult<T, F> = Result<T, PlaybackError<<F as FrameSink>::Error>>;

/// State machine driving an engine and presenting its frames.
#[derive(Debug)]
pub struct PlaybackController<E, S, F> {
    engine: E,
    scheduler: S,
    sink: F,
    mode: PlaybackMode,
    pending: Option<FrameTicket>,
    previous_metrics: Option<FlowMetrics>,
    tick_count: u64,
    events: Vec<PlaybackEvent>,
}

impl<E, S, F> PlaybackController<E, S, F>
where
    E: Engine,
    S: Scheduler,
    F: FrameSink,
{
    /// Creates a paused controller. Nothing is presented until [`Self::present`]
    /// or the first cycle.
    pub fn new(engine: E, scheduler: S, sink: F) -> Self {
        Self {
            engine,
            scheduler,
            sink,
            mode: PlaybackMode::Paused,
            pending: None,
            previous_metrics: None,
            tick_count: 0,
            events: Vec::new(),
        }
    }

    /// Current playback mode.
    #[must_use]
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Reports whether no cycle is scheduled.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.mode == PlaybackMode::Paused
    }

    /// Number of engine ticks performed since construction.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Metrics recorded after the previous cycle, cleared by restarts.
    #[must_use]
    pub fn last_metrics(&self) -> Option<FlowMetrics> {
        self.previous_metrics
    }

    /// Ticket of the scheduled cycle, if any.
    #[must_use]
    pub fn pending_ticket(&self) -> Option<FrameTicket> {
        self.pending
    }

    /// Read-only access to the driven engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Read-only access to the frame sink.
    #[must_use]
    pub fn sink(&self) -> &F {
        &self.sink
    }

    /// Mutable access to the frame sink.
    pub fn sink_mut(&mut self) -> &mut F {
        &mut self.sink
    }

    /// Consumes the controller, returning the frame sink.
    pub fn into_sink(self) -> F {
        self.sink
    }

    /// Removes and returns every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        mem::take(&mut self.events)
    }

    /// Presents the current engine state without ticking.
    pub fn present(&mut self) -> PlaybackResult<(), F> {
        let frame = flowmap_system_frame_decoder::decode(self.engine.packed_cells())?;
        self.sink.present(&frame).map_err(PlaybackError::Present)
    }

    /// Dispatches a user command to the matching transition.
    pub fn apply(&mut self, command: PlaybackCommand) -> PlaybackResult<(), F> {
        match command {
            PlaybackCommand::Play => self.play(),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::TogglePlay => self.toggle(),
            PlaybackCommand::Step => {
                let _ = self.step()?;
            }
            PlaybackCommand::Restart => self.restart()?,
        }
        Ok(())
    }

    /// Starts running; the first cycle runs when the scheduled ticket is due.
    pub fn play(&mut self) {
        if self.mode == PlaybackMode::Running {
            return;
        }
        self.mode = PlaybackMode::Running;
        self.pending = Some(self.scheduler.request_frame());
        self.events.push(PlaybackEvent::Resumed);
        log::debug!("playback resumed at tick {}", self.tick_count);
    }

    /// Stops running and withdraws the scheduled cycle.
    pub fn pause(&mut self) {
        if self.mode == PlaybackMode::Paused {
            return;
        }
        self.halt(PauseReason::User);
    }

    /// Pauses while running and plays while paused.
    pub fn toggle(&mut self) {
        match self.mode {
            PlaybackMode::Running => self.pause(),
            PlaybackMode::Paused => self.play(),
        }
    }

    /// Runs exactly one cycle while paused.
    ///
    /// Returns `false` without touching the engine while running.
    pub fn step(&mut self) -> PlaybackResult<bool, F> {
        if self.mode == PlaybackMode::Running {
            return Ok(false);
        }
        let _ = self.cycle()?;
        Ok(true)
    }

    /// Resets the engine, withdraws any scheduled cycle and presents the reset state.
    pub fn restart(&mut self) -> PlaybackResult<(), F> {
        self.cancel_pending();
        self.engine.reset();
        self.previous_metrics = None;
        if self.mode == PlaybackMode::Running {
            self.mode = PlaybackMode::Paused;
            self.events.push(PlaybackEvent::Paused {
                reason: PauseReason::Restart,
            });
        }
        self.present()?;
        self.events.push(PlaybackEvent::Restarted);
        log::info!("simulation restarted");
        Ok(())
    }

    /// Handles a due frame ticket.
    ///
    /// Returns `true` when a cycle ran. Tickets other than the pending one are
    /// stale and ignored. A failed cycle pauses playback before the error is
    /// returned.
    pub fn on_frame(&mut self, ticket: FrameTicket) -> PlaybackResult<bool, F> {
        if self.mode != PlaybackMode::Running || self.pending != Some(ticket) {
            log::trace!("ignoring stale frame ticket {}", ticket.get());
            return Ok(false);
        }
        self.pending = None;

        match self.cycle() {
            Ok(true) => {
                self.halt(PauseReason::SteadyState);
                log::info!(
                    "steady state reached after {} ticks with {} units of water",
                    self.tick_count,
                    self.engine.metrics().total_water
                );
            }
            Ok(false) => self.pending = Some(self.scheduler.request_frame()),
            Err(error) => {
                self.halt(PauseReason::Failed);
                log::warn!("cycle {} failed: {error}", self.tick_count);
                return Err(error);
            }
        }
        Ok(true)
    }

    /// Polls the scheduler once and runs the cycle of a due ticket.
    ///
    /// Returns `true` when a cycle ran.
    pub fn poll(&mut self) -> PlaybackResult<bool, F> {
        match self.scheduler.poll() {
            Some(ticket) => self.on_frame(ticket),
            None => Ok(false),
        }
    }

    /// Ticks, presents and reports whether the engine reached a steady state.
    fn cycle(&mut self) -> PlaybackResult<bool, F> {
        self.engine.tick();
        self.tick_count += 1;
        self.present()?;

        let metrics = self.engine.metrics();
        let steady = metrics.total_flowing == STEADY_FLOWING_COUNT
            && self
                .previous_metrics
                .is_some_and(|previous| previous.total_water == metrics.total_water);
        self.previous_metrics = Some(metrics);
        self.events.push(PlaybackEvent::Ticked {
            tick: self.tick_count,
            metrics,
        });
        Ok(steady)
    }

    fn halt(&mut self, reason: PauseReason) {
        self.cancel_pending();
        self.mode = PlaybackMode::Paused;
        self.events.push(PlaybackEvent::Paused { reason });
        log::debug!("playback paused at tick {} ({reason:?})", self.tick_count);
    }

    fn cancel_pending(&mut self) {
        if let Some(ticket) = self.pending.take() {
            self.scheduler.cancel(ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmap_core::{
        CellCoord, DecodedFrame, ElevationGrid, EngineError, GridDimensions, PackedFrame,
    };
    use std::convert::Infallible;

    #[derive(Debug, Default)]
    struct CountingSink {
        frames: usize,
    }

    impl FrameSink for CountingSink {
        type Error = Infallible;

        fn present(&mut self, _frame: &DecodedFrame) -> Result<(), Self::Error> {
            self.frames += 1;
            Ok(())
        }
    }

    #[derive(Debug, PartialEq, Error)]
    #[error("display lost")]
    struct DisplayLost;

    /// Sink that rejects its first frame.
    #[derive(Debug, Default)]
    struct FlakySink {
        failed: bool,
        frames: usize,
    }

    impl FrameSink for FlakySink {
        type Error = DisplayLost;

        fn present(&mut self, _frame: &DecodedFrame) -> Result<(), Self::Error> {
            if !self.failed {
                self.failed = true;
                return Err(DisplayLost);
            }
            self.frames += 1;
            Ok(())
        }
    }

    /// Engine whose metrics are scripted per tick.
    #[derive(Debug)]
    struct ScriptedEngine {
        script: Vec<FlowMetrics>,
        ticks: usize,
        packed: Vec<u8>,
    }

    impl ScriptedEngine {
        fn new(script: Vec<FlowMetrics>) -> Self {
            Self {
                script,
                ticks: 0,
                packed: vec![0; 3],
            }
        }
    }

    impl Engine for ScriptedEngine {
        fn create(_grid: &ElevationGrid, _cell_size: u32) -> Result<Self, EngineError> {
            Ok(Self::new(Vec::new()))
        }

        fn tick(&mut self) {
            self.ticks += 1;
        }

        fn reset(&mut self) {
            self.ticks = 0;
        }

        fn seed_source(&mut self, _cell: CellCoord) -> Result<(), EngineError> {
            Ok(())
        }

        fn dimensions(&self) -> GridDimensions {
            GridDimensions::new(1, 1)
        }

        fn metrics(&self) -> FlowMetrics {
            self.ticks
                .checked_sub(1)
                .and_then(|index| self.script.get(index))
                .copied()
                .unwrap_or_default()
        }

        fn packed_cells(&self) -> PackedFrame<'_> {
            PackedFrame::new(&self.packed, self.dimensions())
        }
    }

    fn controller(
        script: Vec<FlowMetrics>,
    ) -> PlaybackController<ScriptedEngine, FrameScheduler, CountingSink> {
        PlaybackController::new(
            ScriptedEngine::new(script),
            FrameScheduler::new(),
            CountingSink::default(),
        )
    }

    #[test]
    fn starts_paused_without_presenting() {
        let playback = controller(Vec::new());
        assert!(playback.is_paused());
        assert_eq!(playback.sink().frames, 0);
        assert_eq!(playback.pending_ticket(), None);
    }

    #[test]
    fn play_schedules_without_ticking() {
        let mut playback = controller(Vec::new());
        playback.play();
        assert_eq!(playback.mode(), PlaybackMode::Running);
        assert_eq!(playback.tick_count(), 0);
        assert!(playback.pending_ticket().is_some());
        assert_eq!(playback.drain_events(), vec![PlaybackEvent::Resumed]);
    }

    #[test]
    fn steady_state_requires_a_previous_cycle() {
        let steady = FlowMetrics::new(4, 1);
        let mut playback = controller(vec![steady, steady, steady]);
        playback.play();

        assert_eq!(playback.poll(), Ok(true));
        assert_eq!(playback.mode(), PlaybackMode::Running, "first cycle cannot halt");
        assert_eq!(playback.poll(), Ok(true));
        assert!(playback.is_paused());
        assert_eq!(playback.pending_ticket(), None);
        assert_eq!(playback.poll(), Ok(false));
        assert_eq!(playback.tick_count(), 2);
    }

    #[test]
    fn failed_presentation_pauses_until_played_again() {
        let busy = FlowMetrics::new(4, 3);
        let mut playback = PlaybackController::new(
            ScriptedEngine::new(vec![busy; 3]),
            FrameScheduler::new(),
            FlakySink::default(),
        );
        playback.play();

        assert_eq!(playback.poll(), Err(PlaybackError::Present(DisplayLost)));
        assert!(playback.is_paused());
        assert_eq!(playback.pending_ticket(), None);
        assert_eq!(
            playback.drain_events(),
            vec![
                PlaybackEvent::Resumed,
                PlaybackEvent::Paused {
                    reason: PauseReason::Failed
                },
            ]
        );
        assert_eq!(playback.poll(), Ok(false), "nothing is scheduled while paused");

        playback.play();
        assert_eq!(playback.poll(), Ok(true));
        assert_eq!(playback.tick_count(), 2);
        assert_eq!(playback.sink().frames, 1);
        assert_eq!(playback.mode(), PlaybackMode::Running);
    }

    #[test]
    fn multiple_flowing_cells_never_halt() {
        let busy = FlowMetrics::new(4, 3);
        let mut playback = controller(vec![busy; 5]);
        playback.play();
        for _ in 0..5 {
            assert_eq!(playback.poll(), Ok(true));
        }
        assert_eq!(playback.mode(), PlaybackMode::Running);
    }

    #[test]
    fn changing_water_keeps_running() {
        let mut playback = controller(vec![
            FlowMetrics::new(1, 1),
            FlowMetrics::new(2, 1),
            FlowMetrics::new(3, 1),
        ]);
        playback.play();
        for _ in 0..3 {
            assert_eq!(playback.poll(), Ok(true));
        }
        assert_eq!(playback.mode(), PlaybackMode::Running);
    }

    #[test]
    fn step_is_ignored_while_running() {
        let mut playback = controller(Vec::new());
        playback.play();
        assert_eq!(playback.step(), Ok(false));
        assert_eq!(playback.tick_count(), 0);
    }

    #[test]
    fn play_and_pause_are_idempotent() {
        let mut playback = controller(Vec::new());
        playback.pause();
        playback.play();
        let ticket = playback.pending_ticket();
        playback.play();
        assert_eq!(playback.pending_ticket(), ticket);
        assert_eq!(playback.drain_events(), vec![PlaybackEvent::Resumed]);
    }

    #[test]
    fn stale_tickets_are_ignored() {
        let mut playback = controller(Vec::new());
        playback.play();
        let stale = playback.pending_ticket().expect("play schedules a ticket");
        playback.pause();
        playback.play();

        assert_eq!(playback.on_frame(stale), Ok(false));
        assert_eq!(playback.tick_count(), 0);
        assert_eq!(playback.poll(), Ok(true));
        assert_eq!(playback.tick_count(), 1);
    }

    #[test]
    fn restart_clears_previous_metrics() {
        let steady = FlowMetrics::new(4, 1);
        let mut playback = controller(vec![steady; 4]);
        assert_eq!(playback.step(), Ok(true));
        assert_eq!(playback.last_metrics(), Some(steady));
        assert_eq!(playback.restart(), Ok(()));
        assert_eq!(playback.last_metrics(), None);
        assert_eq!(playback.sink().frames, 2);
    }
}
