//! Internal playback events (not exposed via SSE)
//!
//! Events emitted by the scheduler's render path and consumed by the
//! narration controller. They are converted to `NarrationEvent` types before
//! broadcasting to clients.

use uuid::Uuid;

/// Internal scheduler → controller events
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A scheduled source's final frame was consumed by the renderer.
    ///
    /// Each source reports exactly its own completion; `active_remaining` is
    /// the size of the active set after this removal, so the controller can
    /// detect "playback fully finished" without polling.
    SourceCompleted {
        source_id: Uuid,
        chunk_index: usize,
        active_remaining: usize,
    },
}
