//! Shared narration state
//!
//! Thread-safe shared state for coordination between the narration controller
//! and the HTTP/SSE surface.

use lectern_common::events::{NarrationEvent, NarrationState};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Current narration session information
#[derive(Debug, Clone)]
pub struct CurrentNarration {
    /// Session ID
    pub session_id: Uuid,
    /// Synthesis voice in use
    pub voice: String,
    /// Total chunks in the plan
    pub total_chunks: usize,
    /// Chunks whose playback has completed
    pub chunks_completed: usize,
    /// True when the degraded single-shot path is narrating
    pub fallback: bool,
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes.
pub struct SharedState {
    /// Current controller state
    pub narration_state: RwLock<NarrationState>,

    /// Currently active session (None when idle)
    pub current: RwLock<Option<CurrentNarration>>,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<NarrationEvent>,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            narration_state: RwLock::new(NarrationState::Idle),
            current: RwLock::new(None),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: NarrationEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<NarrationEvent> {
        self.event_tx.subscribe()
    }

    /// Get current narration state
    pub async fn get_narration_state(&self) -> NarrationState {
        *self.narration_state.read().await
    }

    /// Set narration state
    pub async fn set_narration_state(&self, state: NarrationState) {
        *self.narration_state.write().await = state;
    }

    /// Get current session information
    pub async fn get_current(&self) -> Option<CurrentNarration> {
        self.current.read().await.clone()
    }

    /// Set current session information
    pub async fn set_current(&self, current: Option<CurrentNarration>) {
        *self.current.write().await = current;
    }

    /// Record one more completed chunk for the active session
    pub async fn record_chunk_completed(&self) {
        if let Some(current) = self.current.write().await.as_mut() {
            current.chunks_completed += 1;
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
