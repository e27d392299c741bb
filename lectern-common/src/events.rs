//! Event types for the Lectern event system
//!
//! Events are broadcast by the narration player and streamed to clients
//! over SSE. Serialized with an adjacent `type` tag so clients can route
//! on the variant name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Narration controller state
///
/// `Idle` covers both "never started" and "torn down" sessions; an explicit
/// stop returns here as well. The stopped clock itself is tracked separately
/// by the player's clock handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrationState {
    Idle,
    Synthesizing,
    Speaking,
    Paused,
}

impl std::fmt::Display for NarrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NarrationState::Idle => write!(f, "idle"),
            NarrationState::Synthesizing => write!(f, "synthesizing"),
            NarrationState::Speaking => write!(f, "speaking"),
            NarrationState::Paused => write!(f, "paused"),
        }
    }
}

/// Lectern event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NarrationEvent {
    /// Controller state changed
    StateChanged {
        state: NarrationState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A narration session was created and chunk 0 requested
    SessionStarted {
        session_id: Uuid,
        voice: String,
        total_chunks: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A chunk's audio was scheduled on the session clock
    ChunkScheduled {
        session_id: Uuid,
        chunk_index: usize,
        start_seconds: f64,
        duration_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scheduled chunk finished playing
    ChunkCompleted {
        session_id: Uuid,
        chunk_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic position update (sent while speaking)
    NarrationProgress {
        session_id: Uuid,
        position_seconds: f64,
        chunks_completed: usize,
        total_chunks: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// All scheduled audio finished and no more chunks are pending
    NarrationCompleted {
        session_id: Uuid,
        /// True when the degraded single-shot path produced the audio
        fallback: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The chunked pipeline failed and the degraded path took over
    FallbackEngaged {
        session_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Default narration voice changed
    VoiceChanged {
        voice: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Output volume changed
    VolumeChanged {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}
