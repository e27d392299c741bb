//! Narration controller
//!
//! Orchestrates the pipeline: plans chunks, fetches chunk 0 eagerly, then
//! fetches and schedules the remaining chunks sequentially in the background.
//! One synthesis request is in flight at a time; ordering simplicity and
//! bounded memory are the point, so do not parallelize the chunk loop.
//!
//! State machine: `Idle → Synthesizing → Speaking ⇄ Paused`, any state back
//! to `Idle` via `stop()`, and `Synthesizing → Idle` plus the degraded
//! whole-text path on chunk failure.
//!
//! Liveness: every session gets a fresh generation number; stale async
//! continuations compare their captured generation against the counter and
//! discard their results. In-flight synthesis requests are not cancelled,
//! their results are ignored on arrival.

use crate::audio::decode::decode_synthesized_chunk;
use crate::audio::output::{spawn_device_sink, spawn_null_sink};
use crate::audio::types::{ChunkBuffer, SYNTHESIS_SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::planner::{plan_chunks, TextChunk};
use crate::playback::events::SchedulerEvent;
use crate::playback::scheduler::PlaybackScheduler;
use crate::state::{CurrentNarration, SharedState};
use crate::synth::{strip_markup, FallbackSpeech, SpeechSynthesizer};
use lectern_common::events::{NarrationEvent, NarrationState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Interval between NarrationProgress events while speaking
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Output sink selection
#[derive(Debug, Clone)]
pub enum SinkKind {
    /// Real audio device (None = default device)
    Device(Option<String>),
    /// Clock-driving sink without hardware, for headless runs and tests
    Null,
}

/// Controller construction options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub sink: SinkKind,
    pub default_voice: String,
}

/// One narration session's handle inside the controller
struct Session {
    session_id: Uuid,
    mode: SessionMode,
    /// Signals the sink thread / fallback process to tear down
    stop_tx: watch::Sender<bool>,
}

enum SessionMode {
    Chunked {
        scheduler: Arc<PlaybackScheduler>,
        /// Set once the background loop has scheduled the final chunk
        fetch_done: Arc<AtomicBool>,
    },
    Fallback,
}

/// Narration controller - orchestrates planner, synthesis, and scheduling
pub struct NarrationEngine {
    state: Arc<SharedState>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    fallback: Arc<dyn FallbackSpeech>,
    options: EngineOptions,
    /// Default voice for sessions that do not name one
    voice: Arc<RwLock<String>>,
    session: Arc<AsyncMutex<Option<Session>>>,
    /// Liveness token source; bumped on every session start and stop
    generation: Arc<AtomicU64>,
    /// Master volume, shared with the device sink callback
    volume: Arc<Mutex<f32>>,
}

impl NarrationEngine {
    /// Create a new narration controller
    pub fn new(
        state: Arc<SharedState>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        fallback: Arc<dyn FallbackSpeech>,
        options: EngineOptions,
    ) -> Self {
        let default_voice = options.default_voice.clone();
        Self {
            state,
            synthesizer,
            fallback,
            options,
            voice: Arc::new(RwLock::new(default_voice)),
            session: Arc::new(AsyncMutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            volume: Arc::new(Mutex::new(0.75)), // Default 75% volume
        }
    }

    /// Clone handles for spawned tasks
    fn clone_handles(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            synthesizer: Arc::clone(&self.synthesizer),
            fallback: Arc::clone(&self.fallback),
            options: self.options.clone(),
            voice: Arc::clone(&self.voice),
            session: Arc::clone(&self.session),
            generation: Arc::clone(&self.generation),
            volume: Arc::clone(&self.volume),
        }
    }

    /// Shared volume Arc (handed to the device sink)
    pub fn volume_arc(&self) -> Arc<Mutex<f32>> {
        Arc::clone(&self.volume)
    }

    /// Get master volume (0.0-1.0)
    pub fn get_volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    /// Set master volume (0.0-1.0, clamped)
    pub fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        *self.volume.lock().unwrap() = clamped;
        self.state.broadcast_event(NarrationEvent::VolumeChanged {
            volume: clamped,
            timestamp: lectern_common::time::now(),
        });
    }

    /// Default voice for new sessions
    pub async fn current_voice(&self) -> String {
        self.voice.read().await.clone()
    }

    /// Session clock position in seconds (0.0 when idle or in fallback)
    pub async fn position_seconds(&self) -> f64 {
        match self.session.lock().await.as_ref() {
            Some(Session { mode: SessionMode::Chunked { scheduler, .. }, .. }) => {
                scheduler.position_seconds()
            }
            _ => 0.0,
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn set_state(&self, state: NarrationState) {
        self.state.set_narration_state(state).await;
        self.state.broadcast_event(NarrationEvent::StateChanged {
            state,
            timestamp: lectern_common::time::now(),
        });
    }

    /// Start narrating `text`.
    ///
    /// Returns the new session id, or None when the planner produced no
    /// chunks (empty input is a no-op, not an error). Fails with
    /// `InvalidState` while another session is active and `AudioOutput` when
    /// the device cannot be opened; in both cases the controller state is
    /// unchanged.
    pub async fn speak(&self, text: String, voice: Option<String>) -> Result<Option<Uuid>> {
        let chunks = plan_chunks(&text);
        if chunks.is_empty() {
            debug!("Nothing to narrate; staying idle");
            return Ok(None);
        }

        let mut session_slot = self.session.lock().await;
        if session_slot.is_some() {
            return Err(Error::InvalidState("Narration already active".to_string()));
        }

        let voice = match voice {
            Some(v) => v,
            None => self.voice.read().await.clone(),
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = Uuid::new_v4();
        let total_chunks = chunks.len();

        // One clock per session, created at playback start
        let (scheduler, event_rx) = PlaybackScheduler::new(SYNTHESIS_SAMPLE_RATE);
        let (stop_tx, stop_rx) = watch::channel(false);

        match &self.options.sink {
            SinkKind::Device(device_name) => {
                let ready = spawn_device_sink(
                    device_name.clone(),
                    self.volume_arc(),
                    Arc::clone(&scheduler),
                    stop_rx,
                );
                match ready.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        scheduler.stop();
                        return Err(e);
                    }
                    Err(_) => {
                        scheduler.stop();
                        return Err(Error::AudioOutput("Audio output thread died".to_string()));
                    }
                }
            }
            SinkKind::Null => {
                spawn_null_sink(Arc::clone(&scheduler), stop_rx);
            }
        }

        let fetch_done = Arc::new(AtomicBool::new(false));
        *session_slot = Some(Session {
            session_id,
            mode: SessionMode::Chunked {
                scheduler: Arc::clone(&scheduler),
                fetch_done: Arc::clone(&fetch_done),
            },
            stop_tx,
        });
        drop(session_slot);

        info!(%session_id, voice = %voice, total_chunks, "Starting narration session");

        self.state
            .set_current(Some(CurrentNarration {
                session_id,
                voice: voice.clone(),
                total_chunks,
                chunks_completed: 0,
                fallback: false,
            }))
            .await;
        self.set_state(NarrationState::Synthesizing).await;
        self.state.broadcast_event(NarrationEvent::SessionStarted {
            session_id,
            voice: voice.clone(),
            total_chunks,
            timestamp: lectern_common::time::now(),
        });

        self.spawn_session_monitor(generation, session_id, Arc::clone(&scheduler), event_rx);
        self.spawn_chunk_loop(generation, session_id, chunks, text, voice, scheduler, fetch_done);

        Ok(Some(session_id))
    }

    /// Pause the active chunked session
    pub async fn pause(&self) -> Result<()> {
        let session_slot = self.session.lock().await;
        let scheduler = match session_slot.as_ref() {
            Some(Session { mode: SessionMode::Chunked { scheduler, .. }, .. }) => {
                Arc::clone(scheduler)
            }
            Some(Session { mode: SessionMode::Fallback, .. }) => {
                return Err(Error::InvalidState(
                    "Fallback narration cannot be paused".to_string(),
                ));
            }
            None => return Err(Error::InvalidState("No active narration".to_string())),
        };
        drop(session_slot);

        if self.state.get_narration_state().await != NarrationState::Speaking {
            return Err(Error::InvalidState("Can only pause while speaking".to_string()));
        }

        scheduler.pause();
        self.set_state(NarrationState::Paused).await;
        info!("Narration paused");
        Ok(())
    }

    /// Resume a paused session
    pub async fn resume(&self) -> Result<()> {
        let session_slot = self.session.lock().await;
        let scheduler = match session_slot.as_ref() {
            Some(Session { mode: SessionMode::Chunked { scheduler, .. }, .. }) => {
                Arc::clone(scheduler)
            }
            _ => return Err(Error::InvalidState("No paused narration".to_string())),
        };
        drop(session_slot);

        if self.state.get_narration_state().await != NarrationState::Paused {
            return Err(Error::InvalidState("Narration is not paused".to_string()));
        }

        scheduler.resume();
        self.set_state(NarrationState::Speaking).await;
        info!("Narration resumed");
        Ok(())
    }

    /// Hard reset to Idle. Idempotent.
    ///
    /// Halts every scheduled source immediately; in-flight synthesis results
    /// are discarded when they arrive (requests are not cancellable
    /// mid-flight). The fallback speech process, if any, is killed.
    pub async fn stop(&self) -> Result<()> {
        let mut session_slot = self.session.lock().await;
        // Invalidate stale continuations even if no session is registered yet
        self.generation.fetch_add(1, Ordering::SeqCst);

        let Some(session) = session_slot.take() else {
            drop(session_slot);
            if self.state.get_narration_state().await != NarrationState::Idle {
                self.set_state(NarrationState::Idle).await;
            }
            return Ok(());
        };
        drop(session_slot);

        if let SessionMode::Chunked { scheduler, .. } = &session.mode {
            scheduler.stop();
        }
        let _ = session.stop_tx.send(true);

        info!(session_id = %session.session_id, "Narration stopped");
        self.state.set_current(None).await;
        self.set_state(NarrationState::Idle).await;
        Ok(())
    }

    /// Change the default voice.
    ///
    /// A different voice cannot be gaplessly mixed with buffers already
    /// scheduled for the old one, so any active session is stopped first;
    /// the caller re-invokes `speak` for the new voice.
    pub async fn set_voice(&self, voice: String) -> Result<()> {
        if voice == *self.voice.read().await {
            return Ok(());
        }

        self.stop().await?;
        *self.voice.write().await = voice.clone();
        self.state.broadcast_event(NarrationEvent::VoiceChanged {
            voice,
            timestamp: lectern_common::time::now(),
        });
        Ok(())
    }

    async fn fetch_chunk(&self, chunk: &TextChunk, voice: &str) -> Result<ChunkBuffer> {
        let base64_audio = self.synthesizer.synthesize(&chunk.text, voice).await?;
        decode_synthesized_chunk(&base64_audio)
    }

    /// Background loop: chunk 0 eagerly, then 1..N strictly sequentially.
    #[allow(clippy::too_many_arguments)]
    fn spawn_chunk_loop(
        &self,
        generation: u64,
        session_id: Uuid,
        chunks: Vec<TextChunk>,
        full_text: String,
        voice: String,
        scheduler: Arc<PlaybackScheduler>,
        fetch_done: Arc<AtomicBool>,
    ) {
        let engine = self.clone_handles();
        tokio::spawn(async move {
            for (position, chunk) in chunks.iter().enumerate() {
                // Stopped or superseded while idle between steps: halt
                // quietly rather than race a dead clock
                if !engine.is_live(generation) || !scheduler.is_alive() {
                    debug!(%session_id, "Chunk loop halted (session no longer live)");
                    return;
                }

                let buffer = match engine.fetch_chunk(chunk, &voice).await {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        warn!(chunk_index = chunk.index, error = %e, "Chunk synthesis failed");
                        engine.engage_fallback(generation, session_id, &full_text, e).await;
                        return;
                    }
                };

                // The fetch was an async boundary; a stop may have landed
                if !engine.is_live(generation) || !scheduler.is_alive() {
                    debug!(%session_id, "Discarding late chunk result");
                    return;
                }

                let handle = match scheduler.schedule(buffer, chunk.index) {
                    Ok(handle) => handle,
                    Err(_) => return, // clock closed between checks
                };

                if position == 0 {
                    // First audio is on the clock: synthesis latency is no
                    // longer user-visible
                    engine.set_state(NarrationState::Speaking).await;
                }

                engine.state.broadcast_event(NarrationEvent::ChunkScheduled {
                    session_id,
                    chunk_index: handle.chunk_index,
                    start_seconds: handle.start_seconds,
                    duration_seconds: handle.duration_seconds,
                    timestamp: lectern_common::time::now(),
                });
            }

            fetch_done.store(true, Ordering::SeqCst);
            // Tiny buffers may all have completed before fetch_done was set
            engine.maybe_complete(generation).await;
        });
    }

    /// Scheduler event pump + progress reporting for one session.
    fn spawn_session_monitor(
        &self,
        generation: u64,
        session_id: Uuid,
        scheduler: Arc<PlaybackScheduler>,
        mut event_rx: mpsc::UnboundedReceiver<SchedulerEvent>,
    ) {
        let engine = self.clone_handles();
        tokio::spawn(async move {
            let mut progress_tick = interval(PROGRESS_INTERVAL);
            progress_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        let Some(event) = event else { break };
                        // A completion from a severed source must not
                        // resurrect the speaking state
                        if !engine.is_live(generation) {
                            break;
                        }
                        match event {
                            SchedulerEvent::SourceCompleted { chunk_index, active_remaining, .. } => {
                                engine.state.record_chunk_completed().await;
                                engine.state.broadcast_event(NarrationEvent::ChunkCompleted {
                                    session_id,
                                    chunk_index,
                                    timestamp: lectern_common::time::now(),
                                });
                                if active_remaining == 0 {
                                    // Natural completion only once the fetch
                                    // loop is also done; an emptied set during
                                    // a stall keeps the session speaking
                                    engine.maybe_complete(generation).await;
                                }
                            }
                        }
                    }
                    _ = progress_tick.tick() => {
                        if !engine.is_live(generation) {
                            break;
                        }
                        if engine.state.get_narration_state().await == NarrationState::Speaking {
                            if let Some(current) = engine.state.get_current().await {
                                engine.state.broadcast_event(NarrationEvent::NarrationProgress {
                                    session_id,
                                    position_seconds: scheduler.position_seconds(),
                                    chunks_completed: current.chunks_completed,
                                    total_chunks: current.total_chunks,
                                    timestamp: lectern_common::time::now(),
                                });
                            }
                        }
                    }
                }
            }
            debug!(%session_id, "Session monitor exited");
        });
    }

    /// Finish the session if all scheduled audio played and no chunk is
    /// still pending.
    async fn maybe_complete(&self, generation: u64) {
        let mut session_slot = self.session.lock().await;
        if !self.is_live(generation) {
            return;
        }
        let done = matches!(
            session_slot.as_ref(),
            Some(Session {
                mode: SessionMode::Chunked { scheduler, fetch_done },
                ..
            }) if fetch_done.load(Ordering::SeqCst) && scheduler.active_count() == 0
        );
        if !done {
            return;
        }

        let session = session_slot.take().expect("session checked above");
        drop(session_slot);

        if let SessionMode::Chunked { scheduler, .. } = &session.mode {
            scheduler.stop();
        }
        let _ = session.stop_tx.send(true);

        info!(session_id = %session.session_id, "Narration completed");
        self.state.set_current(None).await;
        self.set_state(NarrationState::Idle).await;
        self.state.broadcast_event(NarrationEvent::NarrationCompleted {
            session_id: session.session_id,
            fallback: false,
            timestamp: lectern_common::time::now(),
        });
    }

    /// Single consistent failure policy: abort the chunked session, narrate
    /// the whole original text once on the degraded path.
    async fn engage_fallback(
        &self,
        generation: u64,
        session_id: Uuid,
        full_text: &str,
        cause: Error,
    ) {
        let mut session_slot = self.session.lock().await;
        if !self.is_live(generation) {
            return;
        }
        let Some(session) = session_slot.as_mut() else {
            return;
        };

        // Tear down the chunked pipeline; the session slot stays occupied so
        // stop() can still cancel the fallback process
        if let SessionMode::Chunked { scheduler, .. } = &session.mode {
            scheduler.stop();
        }
        let _ = session.stop_tx.send(true);

        let (fallback_stop_tx, fallback_stop_rx) = watch::channel(false);
        session.stop_tx = fallback_stop_tx;
        session.mode = SessionMode::Fallback;
        drop(session_slot);

        warn!(%session_id, error = %cause, "Chunked synthesis failed; engaging fallback narration");

        if let Some(mut current) = self.state.get_current().await {
            current.fallback = true;
            self.state.set_current(Some(current)).await;
        }
        self.set_state(NarrationState::Idle).await;
        self.state.broadcast_event(NarrationEvent::FallbackEngaged {
            session_id,
            reason: cause.to_string(),
            timestamp: lectern_common::time::now(),
        });

        let engine = self.clone_handles();
        let text = strip_markup(full_text);
        tokio::spawn(async move {
            if !engine.is_live(generation) {
                return;
            }
            engine.set_state(NarrationState::Speaking).await;

            let result = engine.fallback.speak(&text, fallback_stop_rx).await;

            if !engine.is_live(generation) {
                return; // stopped while the fallback spoke
            }
            let mut session_slot = engine.session.lock().await;
            if !engine.is_live(generation) {
                return;
            }
            session_slot.take();
            drop(session_slot);

            engine.state.set_current(None).await;
            engine.set_state(NarrationState::Idle).await;
            match result {
                Ok(()) => {
                    engine.state.broadcast_event(NarrationEvent::NarrationCompleted {
                        session_id,
                        fallback: true,
                        timestamp: lectern_common::time::now(),
                    });
                }
                Err(e) => {
                    // Narration is an optional enhancement; failures never
                    // block the rest of the application
                    warn!(%session_id, error = %e, "Fallback narration failed");
                }
            }
        });
    }
}
