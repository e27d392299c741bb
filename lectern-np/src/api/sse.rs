//! Server-Sent Events (SSE) broadcaster
//!
//! Streams real-time narration events to connected clients.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::{Stream, StreamExt};
use lectern_common::events::NarrationEvent;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe to event broadcast
    let rx = ctx.state.subscribe_events();

    // Convert broadcast receiver to stream
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                // Serialize event to JSON
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        let event_type = event_type_str(&event);
                        debug!("Broadcasting SSE event: {}", event_type);

                        Some(Ok(Event::default().event(event_type).data(json)))
                    }
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                // BroadcastStream error (lagged or closed)
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Extract event type string from NarrationEvent
fn event_type_str(event: &NarrationEvent) -> &'static str {
    match event {
        NarrationEvent::StateChanged { .. } => "StateChanged",
        NarrationEvent::SessionStarted { .. } => "SessionStarted",
        NarrationEvent::ChunkScheduled { .. } => "ChunkScheduled",
        NarrationEvent::ChunkCompleted { .. } => "ChunkCompleted",
        NarrationEvent::NarrationProgress { .. } => "NarrationProgress",
        NarrationEvent::NarrationCompleted { .. } => "NarrationCompleted",
        NarrationEvent::FallbackEngaged { .. } => "FallbackEngaged",
        NarrationEvent::VoiceChanged { .. } => "VoiceChanged",
        NarrationEvent::VolumeChanged { .. } => "VolumeChanged",
    }
}
