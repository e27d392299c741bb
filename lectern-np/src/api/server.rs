//! HTTP server setup and routing
//!
//! Sets up the Axum router with control endpoints and SSE.

use crate::playback::engine::NarrationEngine;
use crate::state::SharedState;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for free
/// via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub engine: Arc<NarrationEngine>,
}

/// Build the application router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Narration control
        .route("/narration/speak", post(super::handlers::speak))
        .route("/narration/pause", post(super::handlers::pause))
        .route("/narration/resume", post(super::handlers::resume))
        .route("/narration/stop", post(super::handlers::stop))
        .route("/narration/voice", put(super::handlers::set_voice))
        .route("/narration/status", get(super::handlers::status))
        // Audio device management
        .route("/audio/devices", get(super::handlers::list_audio_devices))
        .route("/audio/volume", get(super::handlers::get_volume))
        .route("/audio/volume", post(super::handlers::set_volume))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
