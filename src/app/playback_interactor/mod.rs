// Playback interactor - Frame navigation and timed playback over one open source

use std::future::Future;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::PlaybackTiming;
use crate::ports::*;

/// Playback mode; at most one continuous mode is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// One-shot seek in progress
    Stepping,
    PlayingForward,
    /// Wraps to `start` on reaching `end`
    LoopingRange { start: FrameIndex, end: FrameIndex },
    /// Stops on reaching `end`
    PlayingRange { start: FrameIndex, end: FrameIndex },
}

impl PlaybackState {
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            PlaybackState::PlayingForward
                | PlaybackState::LoopingRange { .. }
                | PlaybackState::PlayingRange { .. }
        )
    }
}

/// Why continuous playback ended
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Requested,
    EndOfSource,
    EndOfRange,
    DecodeFailed(DomainError),
}

/// Result of one timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was shown and playback continues
    Continue,
    /// Playback ended during this tick
    Stopped,
    /// Nothing is playing
    Idle,
}

/// Receives playback events; every method has a no-op default
pub trait PlaybackObserver {
    fn on_frame(&self, _frame: &DecodedFrame) {}

    fn on_state_changed(&self, _state: PlaybackState) {}

    /// `last_frame` is the last frame successfully shown
    fn on_stopped(&self, _last_frame: Option<FrameIndex>, _reason: &StopReason) {}
}

/// Observer that ignores every event
pub struct NoopPlaybackObserver;

impl PlaybackObserver for NoopPlaybackObserver {}

/// Explicit playback state machine over one exclusive decoder handle
pub struct PlaybackController {
    source: Box<dyn FrameSource>,
    state: PlaybackState,
    current_frame: Option<FrameIndex>,
}

impl PlaybackController {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            state: PlaybackState::Idle,
            current_frame: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Last frame actually decoded and shown
    pub fn current_frame(&self) -> Option<FrameIndex> {
        self.current_frame
    }

    pub fn properties(&self) -> VideoProperties {
        self.source.properties()
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        PlaybackTiming::tick_interval(self.properties().fps)
    }

    /// Play from the current position to the end of the source
    pub fn play_forward(&mut self, observer: &dyn PlaybackObserver) {
        self.enter(PlaybackState::PlayingForward, observer);
    }

    /// Loop over `range` until stopped
    pub fn loop_range(&mut self, range: &Range, observer: &dyn PlaybackObserver) -> Result<(), DomainError> {
        let (start, end) = self.bounded(range.start, range.end)?;
        self.halt(observer, StopReason::Requested);
        self.source.seek(start)?;
        self.enter(PlaybackState::LoopingRange { start, end }, observer);
        Ok(())
    }

    /// Play `[start, end)` once
    pub fn play_range(
        &mut self,
        start: FrameIndex,
        end: FrameIndex,
        observer: &dyn PlaybackObserver,
    ) -> Result<(), DomainError> {
        let (start, end) = self.bounded(start, end)?;
        self.halt(observer, StopReason::Requested);
        self.source.seek(start)?;
        self.enter(PlaybackState::PlayingRange { start, end }, observer);
        Ok(())
    }

    pub fn stop(&mut self, observer: &dyn PlaybackObserver) {
        self.halt(observer, StopReason::Requested);
    }

    /// Stop any playback and show `frame`
    pub fn scrub(&mut self, frame: FrameIndex, observer: &dyn PlaybackObserver) -> Result<FrameIndex, DomainError> {
        self.halt(observer, StopReason::Requested);
        self.state = PlaybackState::Stepping;
        observer.on_state_changed(self.state);

        let result = self.source.seek_and_read(frame);
        self.state = PlaybackState::Idle;
        observer.on_state_changed(self.state);

        match result {
            Ok(decoded) => {
                self.show(&decoded, observer);
                Ok(decoded.index)
            }
            Err(e) => {
                warn!(frame, "Seek failed: {}", e);
                observer.on_stopped(self.current_frame, &StopReason::DecodeFailed(e.clone()));
                Err(e)
            }
        }
    }

    /// Move by `delta` frames from the last shown frame, clamped to the source
    pub fn step_frame(&mut self, delta: i64, observer: &dyn PlaybackObserver) -> Result<FrameIndex, DomainError> {
        let last = self.properties().frame_count.saturating_sub(1) as i64;
        let from = self.current_frame.unwrap_or(0) as i64;
        let target = (from + delta).clamp(0, last) as FrameIndex;
        self.scrub(target, observer)
    }

    /// Move by a number of seconds, at least one frame
    pub fn jump_by_seconds(&mut self, seconds: f64, observer: &dyn PlaybackObserver) -> Result<FrameIndex, DomainError> {
        let delta = PlaybackTiming::frames_for_seconds(seconds, self.properties().fps);
        self.step_frame(delta, observer)
    }

    /// Repeat a jump of `seconds` `jumps` times; negative counts move backwards
    pub fn jump(&mut self, jumps: i64, seconds: f64, observer: &dyn PlaybackObserver) -> Result<Option<FrameIndex>, DomainError> {
        let seconds = seconds.abs().copysign(jumps as f64);
        for _ in 0..jumps.unsigned_abs() {
            self.jump_by_seconds(seconds, observer)?;
        }
        Ok(self.current_frame)
    }

    /// Advance continuous playback by one frame
    pub fn tick(&mut self, observer: &dyn PlaybackObserver) -> TickOutcome {
        let position = self.source.position();
        match self.state {
            PlaybackState::Idle | PlaybackState::Stepping => return TickOutcome::Idle,
            PlaybackState::PlayingRange { start, end } if position >= end => {
                self.halt(observer, StopReason::EndOfRange);
                match self.source.seek_and_read(start) {
                    Ok(decoded) => self.show(&decoded, observer),
                    Err(e) => warn!(frame = start, "Rewind to range start failed: {}", e),
                }
                return TickOutcome::Stopped;
            }
            PlaybackState::LoopingRange { start, end } if position >= end => {
                debug!(start, end, "Looping back to range start");
                if let Err(e) = self.source.seek(start) {
                    self.halt(observer, StopReason::DecodeFailed(e));
                    return TickOutcome::Stopped;
                }
            }
            PlaybackState::PlayingForward if position >= self.properties().frame_count => {
                self.halt(observer, StopReason::EndOfSource);
                return TickOutcome::Stopped;
            }
            _ => {}
        }

        match self.source.read_frame() {
            Ok(decoded) => {
                self.show(&decoded, observer);
                TickOutcome::Continue
            }
            Err(e) => {
                warn!("Playback read failed: {}", e);
                self.halt(observer, StopReason::DecodeFailed(e));
                TickOutcome::Stopped
            }
        }
    }

    fn show(&mut self, decoded: &DecodedFrame, observer: &dyn PlaybackObserver) {
        self.current_frame = Some(decoded.index);
        observer.on_frame(decoded);
    }

    /// Leave any continuous mode through `Idle`
    fn halt(&mut self, observer: &dyn PlaybackObserver, reason: StopReason) {
        if self.state.is_continuous() {
            self.state = PlaybackState::Idle;
            observer.on_state_changed(self.state);
            observer.on_stopped(self.current_frame, &reason);
        }
    }

    fn enter(&mut self, state: PlaybackState, observer: &dyn PlaybackObserver) {
        self.halt(observer, StopReason::Requested);
        self.state = state;
        observer.on_state_changed(state);
    }

    fn bounded(&self, start: FrameIndex, end: FrameIndex) -> Result<(FrameIndex, FrameIndex), DomainError> {
        let end = end.min(self.properties().frame_count);
        if start >= end {
            return Err(DomainError::Validation(format!(
                "Cannot play empty range [{}, {})",
                start, end
            )));
        }
        Ok((start, end))
    }
}

/// Totals of one driven playback session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSummary {
    pub frames_shown: u64,
    pub last_frame: Option<FrameIndex>,
    pub interrupted: bool,
}

/// Drive continuous playback on a timer until it stops or `shutdown` resolves
pub async fn drive_playback<S>(
    controller: &mut PlaybackController,
    observer: &dyn PlaybackObserver,
    shutdown: S,
) -> PlaybackSummary
where
    S: Future<Output = ()>,
{
    let mut summary = PlaybackSummary::default();
    let mut interval = tokio::time::interval(controller.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        state = ?controller.state(),
        interval_ms = controller.tick_interval().as_millis() as u64,
        "Playback started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                controller.stop(observer);
                summary.interrupted = true;
                break;
            }
            _ = interval.tick() => {
                match controller.tick(observer) {
                    TickOutcome::Continue => summary.frames_shown += 1,
                    TickOutcome::Stopped | TickOutcome::Idle => break,
                }
            }
        }
    }

    summary.last_frame = controller.current_frame();
    info!(
        frames = summary.frames_shown,
        last_frame = ?summary.last_frame,
        interrupted = summary.interrupted,
        "Playback finished"
    );
    summary
}
