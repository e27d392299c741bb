//! # Lectern Narration Player Library (lectern-np)
//!
//! Streaming narration engine with gapless chunk scheduling.
//!
//! **Purpose:** Convert long text into audible speech with minimal time to
//! first sound: plan text chunks, synthesize each over HTTP, decode the PCM
//! payloads, and schedule the buffers back to back on a session clock so
//! playback sounds continuous despite arriving from independent requests.
//!
//! **Architecture:** Planner → synthesis client → PCM decode → gapless
//! scheduler → cpal output, orchestrated by a controller state machine with a
//! degraded whole-text fallback path and an HTTP/SSE control interface.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod planner;
pub mod playback;
pub mod state;
pub mod synth;

pub use error::{Error, Result};
pub use state::SharedState;
