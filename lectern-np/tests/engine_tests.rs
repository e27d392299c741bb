//! Narration controller behavior tests
//!
//! Exercises the full state machine against scripted synthesis outcomes,
//! using the null sink so the session clock runs without hardware and tokio's
//! paused clock keeps everything deterministic.

mod helpers;

use helpers::{ChunkScript, MockFallback, MockSynthesizer, test_engine};
use lectern_common::events::{NarrationEvent, NarrationState};
use lectern_np::error::Error;
use std::time::Duration;
use tokio::sync::broadcast;

async fn next_event(rx: &mut broadcast::Receiver<NarrationEvent>) -> NarrationEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn wait_for_state(rx: &mut broadcast::Receiver<NarrationEvent>, target: NarrationState) {
    loop {
        if let NarrationEvent::StateChanged { state, .. } = next_event(rx).await {
            if state == target {
                return;
            }
        }
    }
}

/// Wait for NarrationCompleted and return its fallback flag
async fn wait_for_completion(rx: &mut broadcast::Receiver<NarrationEvent>) -> bool {
    loop {
        if let NarrationEvent::NarrationCompleted { fallback, .. } = next_event(rx).await {
            return fallback;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn natural_completion_reaches_idle() {
    // Three chunks of 10ms each
    let synthesizer = MockSynthesizer::new(vec![
        ChunkScript::Audio(240),
        ChunkScript::Audio(240),
        ChunkScript::Audio(240),
    ]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer.clone(), fallback.clone());
    let mut rx = state.subscribe_events();

    let session_id = engine
        .speak("One. Two.\n\nThree.".to_string(), None)
        .await
        .unwrap()
        .expect("non-empty text starts a session");

    let fallback_flag = wait_for_completion(&mut rx).await;
    assert!(!fallback_flag, "Chunked path completed; fallback must not be reported");

    assert_eq!(state.get_narration_state().await, NarrationState::Idle);
    assert!(state.get_current().await.is_none());
    assert_eq!(synthesizer.call_count(), 3);
    assert_eq!(fallback.call_count(), 0);

    // Completed session id matches the one speak returned
    let calls = synthesizer.calls();
    assert_eq!(calls[0].0, "One.");
    assert_eq!(calls[1].0, " Two.");
    assert_eq!(calls[2].0, "Three.");
    let _ = session_id;
}

#[tokio::test(start_paused = true)]
async fn chunk0_failure_falls_back_exactly_once() {
    let synthesizer = MockSynthesizer::new(vec![ChunkScript::Fail]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer.clone(), fallback.clone());
    let mut rx = state.subscribe_events();

    engine.speak("Hello there.".to_string(), None).await.unwrap();

    // Synthesizing must be left via Idle before the fallback speaks
    wait_for_state(&mut rx, NarrationState::Synthesizing).await;
    wait_for_state(&mut rx, NarrationState::Idle).await;

    let fallback_flag = wait_for_completion(&mut rx).await;
    assert!(fallback_flag);

    assert_eq!(state.get_narration_state().await, NarrationState::Idle);
    assert_eq!(fallback.call_count(), 1, "Fallback is engaged exactly once per session");
    assert_eq!(synthesizer.call_count(), 1, "Failed chunk is not retried");
}

#[tokio::test(start_paused = true)]
async fn mid_session_failure_aborts_and_falls_back_with_full_text() {
    let synthesizer =
        MockSynthesizer::new(vec![ChunkScript::Audio(2400), ChunkScript::Fail]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer.clone(), fallback.clone());
    let mut rx = state.subscribe_events();

    let text = "# First. And the rest of it.\n\nSecond *paragraph*.";
    engine.speak(text.to_string(), None).await.unwrap();

    let fallback_flag = wait_for_completion(&mut rx).await;
    assert!(fallback_flag);

    // Remaining chunks were never requested after the failure
    assert_eq!(synthesizer.call_count(), 2);
    assert_eq!(fallback.call_count(), 1);

    // The whole original text is narrated, markup stripped
    let narrated = &fallback.calls()[0];
    assert!(!narrated.contains('#') && !narrated.contains('*'));
    assert!(narrated.contains("Second paragraph."));
}

#[tokio::test(start_paused = true)]
async fn voice_change_while_speaking_stops_session_first() {
    // One long chunk (10 seconds) keeps the session speaking
    let synthesizer = MockSynthesizer::new(vec![ChunkScript::Audio(240_000)]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer.clone(), fallback.clone());
    let mut rx = state.subscribe_events();

    engine.speak("Hello there.".to_string(), None).await.unwrap();
    wait_for_state(&mut rx, NarrationState::Speaking).await;

    engine.set_voice("Puck".to_string()).await.unwrap();

    assert_eq!(state.get_narration_state().await, NarrationState::Idle);
    assert!(state.get_current().await.is_none());
    assert_eq!(engine.position_seconds().await, 0.0);

    // No synthesis was issued for the new voice; the caller re-invokes speak
    assert_eq!(synthesizer.call_count(), 1);
    assert_eq!(engine.current_voice().await, "Puck");

    // A new session picks up the new voice
    let synth_calls_before = synthesizer.call_count();
    engine.speak("Again.".to_string(), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls = synthesizer.calls();
    assert!(calls.len() > synth_calls_before);
    assert_eq!(calls.last().unwrap().1, "Puck");
}

#[tokio::test(start_paused = true)]
async fn stall_then_stop_schedules_nothing_more() {
    let synthesizer = MockSynthesizer::new(vec![
        ChunkScript::Audio(2400),
        ChunkScript::Stall,
        ChunkScript::Audio(2400),
    ]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer.clone(), fallback.clone());
    let mut rx = state.subscribe_events();

    engine
        .speak("First. And more.\n\nThird paragraph.".to_string(), None)
        .await
        .unwrap();

    // Chunk 0 gets scheduled; chunk 1 stalls in flight
    loop {
        if let NarrationEvent::ChunkScheduled { chunk_index, .. } = next_event(&mut rx).await {
            assert_eq!(chunk_index, 0);
            break;
        }
    }
    // Wait until the stalled request for chunk 1 is actually in flight
    while synthesizer.call_count() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    engine.stop().await.unwrap();
    assert_eq!(state.get_narration_state().await, NarrationState::Idle);

    // Give stale continuations every chance to misbehave
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Chunk 1 is stalled and chunk 2 must never have been requested
    assert_eq!(synthesizer.call_count(), 2);
    assert_eq!(fallback.call_count(), 0);
    assert_eq!(state.get_narration_state().await, NarrationState::Idle);

    // No completion or late scheduling events after stop
    while let Ok(event) = rx.try_recv() {
        match event {
            NarrationEvent::ChunkScheduled { chunk_index, .. } => {
                assert_eq!(chunk_index, 0, "No chunk after 0 may ever be scheduled");
            }
            NarrationEvent::NarrationCompleted { .. } => {
                panic!("Severed session must not complete");
            }
            NarrationEvent::StateChanged { state, .. } => {
                assert_ne!(state, NarrationState::Speaking, "Stop must not resurrect Speaking");
            }
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_roundtrip() {
    let synthesizer = MockSynthesizer::new(vec![ChunkScript::Audio(240_000)]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer, fallback);
    let mut rx = state.subscribe_events();

    engine.speak("Hello there.".to_string(), None).await.unwrap();
    wait_for_state(&mut rx, NarrationState::Speaking).await;

    engine.pause().await.unwrap();
    assert_eq!(state.get_narration_state().await, NarrationState::Paused);
    let frozen_position = engine.position_seconds().await;

    // Time passes while paused; the session clock must not move
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.position_seconds().await, frozen_position);

    engine.resume().await.unwrap();
    assert_eq!(state.get_narration_state().await, NarrationState::Speaking);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(engine.position_seconds().await > frozen_position);
}

#[tokio::test(start_paused = true)]
async fn pause_without_session_is_invalid_state() {
    let synthesizer = MockSynthesizer::new(vec![]);
    let fallback = MockFallback::new();
    let (engine, _state) = test_engine(synthesizer, fallback);

    assert!(matches!(engine.pause().await, Err(Error::InvalidState(_))));
    assert!(matches!(engine.resume().await, Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn speak_while_active_is_rejected() {
    let synthesizer = MockSynthesizer::new(vec![ChunkScript::Audio(240_000)]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer, fallback);
    let mut rx = state.subscribe_events();

    engine.speak("Hello there.".to_string(), None).await.unwrap();
    wait_for_state(&mut rx, NarrationState::Speaking).await;

    let second = engine.speak("More text.".to_string(), None).await;
    assert!(matches!(second, Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn empty_text_is_a_noop() {
    let synthesizer = MockSynthesizer::new(vec![]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer.clone(), fallback.clone());

    let outcome = engine.speak("   \n\n  ".to_string(), None).await.unwrap();
    assert!(outcome.is_none());

    assert_eq!(state.get_narration_state().await, NarrationState::Idle);
    assert_eq!(synthesizer.call_count(), 0);
    assert_eq!(fallback.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let synthesizer = MockSynthesizer::new(vec![ChunkScript::Audio(240_000)]);
    let fallback = MockFallback::new();
    let (engine, state) = test_engine(synthesizer, fallback);
    let mut rx = state.subscribe_events();

    engine.speak("Hello there.".to_string(), None).await.unwrap();
    wait_for_state(&mut rx, NarrationState::Speaking).await;

    engine.stop().await.unwrap();
    engine.stop().await.unwrap();
    engine.stop().await.unwrap();

    assert_eq!(state.get_narration_state().await, NarrationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stop_kills_a_holding_fallback() {
    let synthesizer = MockSynthesizer::new(vec![ChunkScript::Fail]);
    let fallback = MockFallback::holding();
    let (engine, state) = test_engine(synthesizer, fallback.clone());
    let mut rx = state.subscribe_events();

    engine.speak("Hello there.".to_string(), None).await.unwrap();

    // The fallback engages and holds in Speaking
    wait_for_state(&mut rx, NarrationState::Speaking).await;
    assert_eq!(fallback.call_count(), 1);

    engine.stop().await.unwrap();
    assert_eq!(state.get_narration_state().await, NarrationState::Idle);

    // The cancelled fallback's return must not complete the session
    tokio::time::sleep(Duration::from_secs(1)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, NarrationEvent::NarrationCompleted { .. }),
            "Stopped fallback must not report completion"
        );
    }
}
