mod common;

use std::sync::Mutex;

use common::*;
use rangecrop_cli::app::playback_interactor::*;
use rangecrop_cli::ports::DecodedFrame;
use rangecrop_cli::{FrameIndex, Range, RangeId};

/// Records every frame and state change
#[derive(Default)]
struct Recorder {
    frames: Mutex<Vec<FrameIndex>>,
    states: Mutex<Vec<PlaybackState>>,
    stops: Mutex<Vec<String>>,
}

impl Recorder {
    fn frames(&self) -> Vec<FrameIndex> {
        self.frames.lock().unwrap().clone()
    }

    fn stops(&self) -> Vec<String> {
        self.stops.lock().unwrap().clone()
    }
}

impl PlaybackObserver for Recorder {
    fn on_frame(&self, frame: &DecodedFrame) {
        assert_eq!(frame.image.get_pixel(0, 0)[0], frame_marker(frame.index));
        self.frames.lock().unwrap().push(frame.index);
    }

    fn on_state_changed(&self, state: PlaybackState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_stopped(&self, _last_frame: Option<FrameIndex>, reason: &StopReason) {
        let label = match reason {
            StopReason::Requested => "requested",
            StopReason::EndOfSource => "end-of-source",
            StopReason::EndOfRange => "end-of-range",
            StopReason::DecodeFailed(_) => "decode-failed",
        };
        self.stops.lock().unwrap().push(label.to_string());
    }
}

fn controller(frame_count: u64) -> PlaybackController {
    PlaybackController::new(Box::new(FakeSource::new(props(frame_count, 8, 8, 100.0))))
}

fn range(start: u64, end: u64) -> Range {
    Range {
        id: RangeId::from("r"),
        start,
        end,
        crop: None,
        ordinal: 1,
    }
}

#[test]
fn test_scrub_shows_frame_and_returns_to_idle() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    assert_eq!(player.scrub(12, &recorder).unwrap(), 12);
    assert_eq!(player.current_frame(), Some(12));
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![PlaybackState::Stepping, PlaybackState::Idle]
    );
    assert_eq!(recorder.frames(), vec![12]);
}

#[test]
fn test_step_and_jump_clamp_to_source() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    assert_eq!(player.step_frame(-5, &recorder).unwrap(), 0);
    assert_eq!(player.step_frame(3, &recorder).unwrap(), 3);
    // one second at 100 fps
    assert_eq!(player.jump_by_seconds(1.0, &recorder).unwrap(), 49);
    assert_eq!(player.jump_by_seconds(-0.001, &recorder).unwrap(), 48);
}

#[test]
fn test_repeated_jumps_move_in_either_direction() {
    let mut player = controller(500);
    let recorder = Recorder::default();

    player.scrub(100, &recorder).unwrap();
    // 0.5s at 100 fps is 50 frames per jump
    assert_eq!(player.jump(3, 0.5, &recorder).unwrap(), Some(250));
    assert_eq!(player.jump(-2, 0.5, &recorder).unwrap(), Some(150));
    assert_eq!(player.jump(0, 0.5, &recorder).unwrap(), Some(150));
    assert_eq!(player.jump(-9, 1.0, &recorder).unwrap(), Some(0));
    assert_eq!(player.state(), PlaybackState::Idle);
}

#[test]
fn test_forward_playback_stops_at_end_of_source() {
    let mut player = controller(5);
    let recorder = Recorder::default();

    player.scrub(2, &recorder).unwrap();
    player.play_forward(&recorder);
    assert_eq!(player.state(), PlaybackState::PlayingForward);

    assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    assert_eq!(player.tick(&recorder), TickOutcome::Stopped);
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(recorder.frames(), vec![2, 3, 4]);
    assert_eq!(recorder.stops(), vec!["end-of-source"]);
    assert_eq!(player.tick(&recorder), TickOutcome::Idle);
}

#[test]
fn test_loop_wraps_to_range_start() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    player.loop_range(&range(10, 13), &recorder).unwrap();
    for _ in 0..7 {
        assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    }
    assert_eq!(recorder.frames(), vec![10, 11, 12, 10, 11, 12, 10]);
    assert!(recorder.stops().is_empty());

    player.stop(&recorder);
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(recorder.stops(), vec!["requested"]);
}

#[test]
fn test_play_range_halts_and_rewinds_to_start() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    player.play_range(20, 22, &recorder).unwrap();
    assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    assert_eq!(player.tick(&recorder), TickOutcome::Stopped);

    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.current_frame(), Some(20));
    assert_eq!(recorder.frames(), vec![20, 21, 20]);
    assert_eq!(recorder.stops(), vec!["end-of-range"]);
}

#[test]
fn test_failed_rewind_still_stops_at_range_end() {
    let source = FakeSource::new(props(50, 8, 8, 100.0)).failing_after(2);
    let mut player = PlaybackController::new(Box::new(source));
    let recorder = Recorder::default();

    player.play_range(20, 22, &recorder).unwrap();
    assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    assert_eq!(player.tick(&recorder), TickOutcome::Continue);
    assert_eq!(player.tick(&recorder), TickOutcome::Stopped);

    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.current_frame(), Some(21));
    assert_eq!(recorder.frames(), vec![20, 21]);
    assert_eq!(recorder.stops(), vec!["end-of-range"]);
}

#[test]
fn test_range_end_is_clamped_and_empty_range_rejected() {
    let mut player = controller(10);
    let recorder = Recorder::default();

    player.play_range(8, 40, &recorder).unwrap();
    assert_eq!(player.state(), PlaybackState::PlayingRange { start: 8, end: 10 });

    assert!(player.loop_range(&range(10, 12), &recorder).is_err());
}

#[test]
fn test_decode_failure_stops_playback() {
    let source = FakeSource::new(props(50, 8, 8, 100.0)).failing_at(&[3]);
    let mut player = PlaybackController::new(Box::new(source));
    let recorder = Recorder::default();

    player.play_forward(&recorder);
    let outcomes: Vec<TickOutcome> = (0..4).map(|_| player.tick(&recorder)).collect();

    assert_eq!(
        outcomes,
        vec![
            TickOutcome::Continue,
            TickOutcome::Continue,
            TickOutcome::Continue,
            TickOutcome::Stopped
        ]
    );
    assert_eq!(player.current_frame(), Some(2));
    assert_eq!(recorder.stops(), vec!["decode-failed"]);
    assert_eq!(player.state(), PlaybackState::Idle);
}

#[test]
fn test_switching_modes_passes_through_idle() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    player.play_forward(&recorder);
    player.loop_range(&range(5, 8), &recorder).unwrap();

    let states = recorder.states.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            PlaybackState::PlayingForward,
            PlaybackState::Idle,
            PlaybackState::LoopingRange { start: 5, end: 8 },
        ]
    );
}

#[tokio::test]
async fn test_driver_runs_range_to_completion() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    player.play_range(0, 4, &recorder).unwrap();
    let summary = drive_playback(&mut player, &recorder, std::future::pending()).await;

    assert_eq!(summary.frames_shown, 4);
    assert!(!summary.interrupted);
    assert_eq!(summary.last_frame, Some(0));
}

#[tokio::test]
async fn test_driver_stops_on_shutdown() {
    let mut player = controller(50);
    let recorder = Recorder::default();

    player.loop_range(&range(0, 3), &recorder).unwrap();
    let shutdown = tokio::time::sleep(std::time::Duration::from_millis(60));
    let summary = drive_playback(&mut player, &recorder, shutdown).await;

    assert!(summary.interrupted);
    assert!(summary.frames_shown > 0);
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(recorder.stops(), vec!["requested"]);
}
