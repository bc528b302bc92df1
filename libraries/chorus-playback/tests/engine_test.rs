//! End-to-end engine scenarios against the scripted output

mod common;

use chorus_playback::{
    EngineConfig, ErrorKind, OutputError, PlaybackError, PlaybackEvent, PlaybackStatus,
    PlayerState, TrackDescriptor, TransportState,
};
use common::{assert_consistent, drain, engine, engine_with, settle, track, tracks, uri, DURATION_MS};
use std::sync::{Arc, Mutex};

fn index_of(state: &PlayerState) -> Option<usize> {
    state.current_index
}

fn current_id(state: &PlayerState) -> Option<String> {
    state.current_track.as_ref().map(|t| t.id.clone())
}

// ===== Loading =====

#[tokio::test(start_paused = true)]
async fn test_load_queue_plays_start_track() {
    let (engine, output) = engine();

    engine
        .load_queue(tracks(&["t0", "t1", "t2"]), 1)
        .await
        .unwrap();

    let state = engine.state();
    assert_consistent(&state);
    assert_eq!(index_of(&state), Some(1));
    assert_eq!(current_id(&state).as_deref(), Some("t1"));
    assert!(state.is_playing);
    assert!(!state.is_loading_track);
    assert_eq!(state.transport, TransportState::Playing);
    assert_eq!(state.queue.len(), 3);
    assert_eq!(state.status.duration_millis, DURATION_MS);
    assert_eq!(output.creates(), vec![uri("t1")]);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_start_index_falls_back_to_first() {
    let (engine, _output) = engine();

    engine.load_queue(tracks(&["t0", "t1"]), 7).await.unwrap();

    assert_eq!(index_of(&engine.state()), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_empty_queue_is_reported_and_ignored() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    let mut events = engine.events();

    let result = engine.load_queue(Vec::new(), 0).await;

    assert!(matches!(result, Err(PlaybackError::EmptyQueue)));
    let state = engine.state();
    assert_eq!(current_id(&state).as_deref(), Some("t0"));
    assert_eq!(state.queue.len(), 1);
    assert_eq!(output.creates().len(), 1);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [PlaybackEvent::Error {
            kind: ErrorKind::InvalidTrack,
            ..
        }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_track_leaves_engine_idle() {
    let (engine, output) = engine();
    let mut events = engine.events();
    let mut silent = TrackDescriptor::new("1", "");
    silent.preview_uri = None;

    let result = engine.load_queue(vec![silent], 0).await;

    assert!(matches!(
        result,
        Err(PlaybackError::InvalidTrack { ref track_id }) if track_id == "1"
    ));
    let state = engine.state();
    assert_consistent(&state);
    assert!(state.current_track.is_none());
    assert!(!state.is_loading_track);
    assert!(!state.is_playing);
    assert_eq!(state.transport, TransportState::Idle);
    assert!(output.creates().is_empty());
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        PlaybackEvent::Error {
            kind: ErrorKind::InvalidTrack,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_track_releases_previous_handle() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    let blank = TrackDescriptor::new("t1", "   ");
    assert!(engine.load_queue(vec![blank], 0).await.is_err());

    assert!(output.handle(&uri("t0")).is_unloaded());
    assert_eq!(output.live_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_resets_to_idle() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();
    output.fail(&uri("t1"), OutputError::Decode("unsupported codec".into()));
    let mut events = engine.events();

    let result = engine.play_next().await;

    match result {
        Err(PlaybackError::LoadFailed { track_id, source }) => {
            assert_eq!(track_id, "t1");
            assert_eq!(source, OutputError::Decode("unsupported codec".into()));
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }
    let state = engine.state();
    assert_consistent(&state);
    assert!(state.current_track.is_none());
    assert!(!state.is_loading_track);
    assert_eq!(state.transport, TransportState::Idle);
    assert!(output.handle(&uri("t0")).is_unloaded());
    assert_eq!(output.live_handles(), 0);

    let events = drain(&mut events);
    assert!(matches!(events.first(), Some(PlaybackEvent::TrackChanged { index: 1, .. })));
    assert!(matches!(
        events.last(),
        Some(PlaybackEvent::Error {
            kind: ErrorKind::LoadFailed,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_previous_handle_unloaded_after_new_one_is_live() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();

    engine.play_next().await.unwrap();

    assert_eq!(output.unloads(), vec![uri("t0")]);
    assert_eq!(output.live_handles(), 1);
    assert!(!output.handle(&uri("t1")).is_unloaded());
}

#[tokio::test(start_paused = true)]
async fn test_loading_flag_cleared_by_first_status() {
    let (engine, output) = engine();
    output.report_unloaded_initial();

    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    assert!(engine.state().is_loading_track);
    assert_eq!(engine.state().transport, TransportState::Loading);

    output.handle(&uri("t0")).tick(250);
    settle().await;

    let state = engine.state();
    assert!(!state.is_loading_track);
    assert!(state.is_playing);
    assert_eq!(state.status.position_millis, 250);
}

#[tokio::test(start_paused = true)]
async fn test_load_timeout_turns_hung_create_into_failure() {
    let (engine, output) = engine_with(EngineConfig {
        load_timeout_ms: Some(5_000),
        ..EngineConfig::default()
    });
    let _held = output.hold(&uri("t0"));

    let result = engine.load_queue(tracks(&["t0"]), 0).await;

    assert!(matches!(
        result,
        Err(PlaybackError::LoadFailed {
            source: OutputError::Timeout(_),
            ..
        })
    ));
    let state = engine.state();
    assert!(!state.is_loading_track);
    assert!(state.current_track.is_none());
}

// ===== Superseded loads =====

#[tokio::test(start_paused = true)]
async fn test_superseded_load_is_discarded_and_unloaded() {
    let (engine, output) = engine();
    let gate = output.hold(&uri("t0"));

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.load_queue(tracks(&["t0"]), 0).await }
    });
    settle().await;
    assert!(engine.state().is_loading_track);

    engine.load_queue(tracks(&["t1"]), 0).await.unwrap();
    gate.release();
    pending.await.unwrap().unwrap();
    settle().await;

    let state = engine.state();
    assert_consistent(&state);
    assert_eq!(current_id(&state).as_deref(), Some("t1"));
    assert!(state.is_playing);
    assert!(output.handle(&uri("t0")).is_unloaded());
    assert_eq!(output.live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_failure_does_not_reset_newer_load() {
    let (engine, output) = engine();
    let gate = output.hold(&uri("t0"));

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.load_queue(tracks(&["t0"]), 0).await }
    });
    settle().await;

    engine.load_queue(tracks(&["t1"]), 0).await.unwrap();
    gate.fail(OutputError::Network("connection reset".into()));
    assert!(pending.await.unwrap().is_ok());

    let state = engine.state();
    assert_eq!(current_id(&state).as_deref(), Some("t1"));
    assert!(state.is_playing);
    assert!(!state.is_loading_track);
}

#[tokio::test(start_paused = true)]
async fn test_status_from_replaced_handle_is_ignored() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();
    engine.play_next().await.unwrap();

    output.handle(&uri("t0")).tick(9_000);
    output.handle(&uri("t0")).finish();
    settle().await;

    let state = engine.state();
    assert_eq!(index_of(&state), Some(1));
    assert_eq!(state.status.position_millis, 0);
    assert!(state.is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_slow_advance_does_not_hold_up_status_of_new_queue() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["a", "b"]), 0).await.unwrap();
    let gate = output.hold(&uri("b"));

    output.handle(&uri("a")).finish();
    settle().await;
    assert!(engine.state().is_loading_track);

    engine.load_queue(tracks(&["x"]), 0).await.unwrap();
    output.handle(&uri("x")).tick(5_000);
    settle().await;

    let state = engine.state();
    assert_eq!(current_id(&state).as_deref(), Some("x"));
    assert_eq!(state.status.position_millis, 5_000);
    assert!(!state.is_loading_track);

    gate.release();
    settle().await;

    let state = engine.state();
    assert_consistent(&state);
    assert_eq!(current_id(&state).as_deref(), Some("x"));
    assert!(output.handle(&uri("b")).is_unloaded());
    assert_eq!(output.live_handles(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_during_advance_stays_idle() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["a", "b"]), 0).await.unwrap();
    let gate = output.hold(&uri("b"));

    output.handle(&uri("a")).finish();
    settle().await;
    engine.release().await;

    gate.release();
    settle().await;

    let state = engine.state();
    assert_consistent(&state);
    assert!(state.current_track.is_none());
    assert_eq!(state.transport, TransportState::Idle);
    assert!(output.handle(&uri("b")).is_unloaded());
    assert_eq!(output.live_handles(), 0);
}

// ===== Transport =====

#[tokio::test(start_paused = true)]
async fn test_transport_ignored_while_loading() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1", "t2"]), 0).await.unwrap();
    let gate = output.hold(&uri("t1"));

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.play_next().await }
    });
    settle().await;

    let before = engine.state();
    assert!(before.is_loading_track);

    engine.toggle_play_pause().await.unwrap();
    engine.seek(10_000).await.unwrap();
    engine.play_next().await.unwrap();
    engine.play_previous().await.unwrap();

    assert_eq!(engine.state(), before);
    assert_eq!(output.creates(), vec![uri("t0"), uri("t1")]);

    gate.release();
    pending.await.unwrap().unwrap();
    assert_eq!(index_of(&engine.state()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_pauses_and_resumes() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    let handle = output.handle(&uri("t0"));

    engine.toggle_play_pause().await.unwrap();
    assert!(!engine.state().is_playing);
    assert!(!handle.is_playing());
    assert_eq!(engine.state().transport, TransportState::Paused);

    engine.toggle_play_pause().await.unwrap();
    assert!(engine.state().is_playing);
    assert!(handle.is_playing());
    assert_eq!(engine.state().transport, TransportState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_without_track_is_noop() {
    let (engine, output) = engine();

    engine.toggle_play_pause().await.unwrap();

    assert_eq!(engine.state().transport, TransportState::Idle);
    assert!(output.creates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_previous_twice_from_start_of_second_track() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1", "t2"]), 1).await.unwrap();

    engine.play_previous().await.unwrap();
    assert_eq!(index_of(&engine.state()), Some(0));

    engine.play_previous().await.unwrap();
    let state = engine.state();
    assert_eq!(index_of(&state), Some(0));
    assert_eq!(current_id(&state).as_deref(), Some("t0"));
    assert_eq!(output.handle(&uri("t0")).position(), 0);
    assert_eq!(output.creates(), vec![uri("t1"), uri("t0")]);
}

#[tokio::test(start_paused = true)]
async fn test_play_previous_restarts_past_threshold() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 1).await.unwrap();
    let handle = output.handle(&uri("t1"));

    handle.tick(3_500);
    settle().await;
    assert_eq!(engine.state().status.position_millis, 3_500);

    engine.play_previous().await.unwrap();

    let state = engine.state();
    assert_eq!(index_of(&state), Some(1));
    assert_eq!(state.status.position_millis, 0);
    assert_eq!(handle.position(), 0);
    assert_eq!(output.creates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_play_previous_moves_back_within_threshold() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 1).await.unwrap();

    output.handle(&uri("t1")).tick(2_000);
    settle().await;
    engine.play_previous().await.unwrap();

    assert_eq!(index_of(&engine.state()), Some(0));
    assert_eq!(output.creates(), vec![uri("t1"), uri("t0")]);
}

#[tokio::test(start_paused = true)]
async fn test_next_at_last_track_stops_and_stays() {
    let (engine, output) = engine();
    let mut events = engine.events();
    engine.load_queue(tracks(&["t0", "t1", "t2"]), 0).await.unwrap();

    engine.play_next().await.unwrap();
    engine.play_next().await.unwrap();
    assert_eq!(index_of(&engine.state()), Some(2));

    engine.play_next().await.unwrap();

    let state = engine.state();
    assert_eq!(index_of(&state), Some(2));
    assert_eq!(current_id(&state).as_deref(), Some("t2"));
    assert!(!state.is_playing);
    assert_eq!(state.transport, TransportState::Ended);
    assert!(output.handle(&uri("t2")).was_stopped());
    assert_eq!(output.creates().len(), 3);

    let changes = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            PlaybackEvent::TrackChanged { index, .. } => Some(index),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(changes, vec![0, 1, 2]);
}

// ===== Status events =====

#[tokio::test(start_paused = true)]
async fn test_track_finish_advances_queue() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();

    output.handle(&uri("t0")).finish();
    settle().await;

    let state = engine.state();
    assert_consistent(&state);
    assert_eq!(index_of(&state), Some(1));
    assert!(state.is_playing);
    assert!(output.handle(&uri("t0")).is_unloaded());
}

#[tokio::test(start_paused = true)]
async fn test_end_of_queue_keeps_track_and_index() {
    let (engine, output) = engine();
    let mut events = engine.events();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();

    output.handle(&uri("t0")).finish();
    settle().await;
    output.handle(&uri("t1")).finish();
    settle().await;

    let state = engine.state();
    assert_eq!(index_of(&state), Some(1));
    assert_eq!(current_id(&state).as_deref(), Some("t1"));
    assert!(!state.is_playing);
    assert!(!state.is_loading_track);
    assert_eq!(state.transport, TransportState::Ended);
    assert!(output.handle(&uri("t1")).was_stopped());
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, PlaybackEvent::QueueEnded { track_id } if track_id == "t1")));

    // Ended is resumable and previous still works
    engine.toggle_play_pause().await.unwrap();
    assert_eq!(engine.state().transport, TransportState::Playing);
    engine.play_previous().await.unwrap();
    assert_eq!(index_of(&engine.state()), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_looping_finish_does_not_advance() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();

    let mut status = PlaybackStatus::loaded(DURATION_MS, DURATION_MS, true);
    status.did_just_finish = true;
    status.is_looping = true;
    output.handle(&uri("t0")).emit(status);
    settle().await;

    assert_eq!(index_of(&engine.state()), Some(0));
    assert_eq!(output.creates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_error_surfaces_playback_error() {
    let (engine, output) = engine();
    output.report_unloaded_initial();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    let mut events = engine.events();

    output
        .handle(&uri("t0"))
        .emit(PlaybackStatus::failed("stream interrupted"));
    settle().await;

    assert!(!engine.state().is_loading_track);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        PlaybackEvent::Error {
            kind: ErrorKind::PlaybackError,
            message,
        } if message.contains("stream interrupted")
    )));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_reloads_track_after_handle_error() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1"]), 0).await.unwrap();
    let failed = output.handle(&uri("t0"));

    failed.emit(PlaybackStatus::failed("decoder crashed"));
    settle().await;

    let state = engine.state();
    assert_consistent(&state);
    assert_eq!(current_id(&state).as_deref(), Some("t0"));
    assert!(!state.is_playing);
    assert!(!state.status.is_loaded);
    assert_eq!(state.transport, TransportState::Paused);
    assert!(failed.is_unloaded());
    assert_eq!(output.live_handles(), 0);

    engine.toggle_play_pause().await.unwrap();

    let state = engine.state();
    assert_eq!(output.creates(), vec![uri("t0"), uri("t0")]);
    assert_eq!(index_of(&state), Some(0));
    assert!(state.is_playing);
    assert_eq!(output.live_handles(), 1);
    assert!(output.handle(&uri("t0")).is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_transient_unloaded_status_is_ignored() {
    let (engine, _output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    let before = engine.state();

    engine.on_status_event(PlaybackStatus::default()).await;

    assert_eq!(engine.state(), before);
}

// ===== Seek =====

#[tokio::test(start_paused = true)]
async fn test_seek_drops_status_events_until_settled() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    let seeking = tokio::spawn({
        let engine = engine.clone();
        async move { engine.seek(10_000).await }
    });
    settle().await;

    let state = engine.state();
    assert!(state.is_seeking);
    assert_eq!(state.status.position_millis, 10_000);

    engine
        .on_status_event(PlaybackStatus::loaded(5_000, DURATION_MS, true))
        .await;
    assert_eq!(engine.state().status.position_millis, 10_000);

    seeking.await.unwrap().unwrap();
    assert!(!engine.state().is_seeking);
    assert_eq!(output.handle(&uri("t0")).position(), 10_000);

    engine
        .on_status_event(PlaybackStatus::loaded(11_000, DURATION_MS, true))
        .await;
    assert_eq!(engine.state().status.position_millis, 11_000);
}

#[tokio::test(start_paused = true)]
async fn test_seek_clamps_to_duration() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    engine.seek(DURATION_MS * 4).await.unwrap();

    assert_eq!(output.handle(&uri("t0")).position(), DURATION_MS);
    assert_eq!(engine.state().status.position_millis, DURATION_MS);
}

#[tokio::test(start_paused = true)]
async fn test_seek_failure_is_reported_and_flag_reset() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    output
        .handle(&uri("t0"))
        .fail_seeks(OutputError::Other("not seekable".into()));
    let mut events = engine.events();

    let result = engine.seek(4_000).await;

    assert!(matches!(result, Err(PlaybackError::SeekFailed(_))));
    let state = engine.state();
    assert!(!state.is_seeking);
    assert!(state.is_playing);
    assert_eq!(state.status.position_millis, 0);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        PlaybackEvent::Error {
            kind: ErrorKind::SeekFailed,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_seek_with_unknown_duration_is_noop() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();
    engine
        .on_status_event(PlaybackStatus {
            is_loaded: true,
            is_playing: true,
            duration_millis: None,
            ..PlaybackStatus::default()
        })
        .await;

    engine.seek(5_000).await.unwrap();

    assert_eq!(output.handle(&uri("t0")).position(), 0);
    assert!(!engine.state().is_seeking);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_seek_gesture_accepts_status_again() {
    let (engine, _output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    engine.begin_seek();
    engine
        .on_status_event(PlaybackStatus::loaded(7_000, DURATION_MS, true))
        .await;
    assert_eq!(engine.state().status.position_millis, 0);

    engine.cancel_seek();
    engine
        .on_status_event(PlaybackStatus::loaded(7_000, DURATION_MS, true))
        .await;
    assert_eq!(engine.state().status.position_millis, 7_000);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_seek_still_clears_flag() {
    let (engine, _output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    let seeking = tokio::spawn({
        let engine = engine.clone();
        async move { engine.seek(1_000).await }
    });
    settle().await;
    assert!(engine.state().is_seeking);

    seeking.abort();
    let _ = seeking.await;

    assert!(!engine.state().is_seeking);
}

// ===== Store =====

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_loading_then_playing() {
    let (engine, _output) = engine();
    let seen: Arc<Mutex<Vec<PlayerState>>> = Arc::default();

    let subscription = engine.subscribe({
        let seen = Arc::clone(&seen);
        move |state| seen.lock().unwrap().push(state.clone())
    });
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    {
        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(assert_consistent_ok));
        assert_eq!(seen.first().map(|s| s.transport), Some(TransportState::Loading));
        assert_eq!(seen.last().map(|s| s.transport), Some(TransportState::Playing));
    }

    assert!(subscription.unsubscribe());
    let count = seen.lock().unwrap().len();
    engine.toggle_play_pause().await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), count);
}

fn assert_consistent_ok(state: &PlayerState) -> bool {
    assert_consistent(state);
    true
}

#[tokio::test(start_paused = true)]
async fn test_release_unloads_active_handle() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0"]), 0).await.unwrap();

    engine.release().await;

    assert!(output.handle(&uri("t0")).is_unloaded());
    assert_eq!(output.live_handles(), 0);
    assert_eq!(engine.state().transport, TransportState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_unloads_match_creates_at_rest() {
    let (engine, output) = engine();
    engine.load_queue(tracks(&["t0", "t1", "t2"]), 0).await.unwrap();
    engine.play_next().await.unwrap();
    engine.play_previous().await.unwrap();
    engine.load_queue(vec![track("t3")], 0).await.unwrap();
    settle().await;

    assert_eq!(output.unloads().len(), output.handles().len() - 1);
    assert_eq!(output.live_handles(), 1);
}
