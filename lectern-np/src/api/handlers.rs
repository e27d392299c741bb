//! HTTP request handlers
//!
//! Implements the REST endpoints for narration control.

use crate::api::server::AppContext;
use crate::error::Error;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    text: String,
    voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    status: String,
    session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    voice: String,
}

#[derive(Debug, Serialize)]
pub struct NarrationStatusResponse {
    state: String,
    voice: String,
    position_seconds: f64,
    session_id: Option<Uuid>,
    total_chunks: usize,
    chunks_completed: usize,
    fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: u8, // 0-100 user-facing scale
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u8,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

type HandlerError = (StatusCode, Json<StatusMessage>);

fn error_response(err: Error) -> HandlerError {
    let status = match &err {
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(StatusMessage { status: format!("error: {}", err) }))
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "narration_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Narration Endpoints
// ============================================================================

/// POST /narration/speak - Start a narration session
pub async fn speak(
    State(ctx): State<AppContext>,
    Json(request): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, HandlerError> {
    match ctx.engine.speak(request.text, request.voice).await {
        Ok(Some(session_id)) => {
            info!(%session_id, "Narration session accepted");
            Ok(Json(SpeakResponse { status: "started".to_string(), session_id: Some(session_id) }))
        }
        Ok(None) => Ok(Json(SpeakResponse { status: "empty".to_string(), session_id: None })),
        Err(e) => {
            error!("Failed to start narration: {}", e);
            Err(error_response(e))
        }
    }
}

/// POST /narration/pause - Pause the active session
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.engine.pause().await.map_err(error_response)?;
    Ok(Json(StatusMessage { status: "paused".to_string() }))
}

/// POST /narration/resume - Resume a paused session
pub async fn resume(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.engine.resume().await.map_err(error_response)?;
    Ok(Json(StatusMessage { status: "speaking".to_string() }))
}

/// POST /narration/stop - Stop narration (idempotent)
pub async fn stop(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.engine.stop().await.map_err(error_response)?;
    Ok(Json(StatusMessage { status: "stopped".to_string() }))
}

/// PUT /narration/voice - Change the default voice
///
/// Stops any active session first: buffers of the old voice cannot be
/// gaplessly mixed with the new one.
pub async fn set_voice(
    State(ctx): State<AppContext>,
    Json(request): Json<VoiceRequest>,
) -> Result<Json<StatusMessage>, HandlerError> {
    if request.voice.trim().is_empty() {
        return Err(error_response(Error::Config("Voice must not be empty".to_string())));
    }
    ctx.engine.set_voice(request.voice).await.map_err(error_response)?;
    Ok(Json(StatusMessage { status: "voice changed".to_string() }))
}

/// GET /narration/status - Current controller state and progress
pub async fn status(State(ctx): State<AppContext>) -> Json<NarrationStatusResponse> {
    let state = ctx.state.get_narration_state().await;
    let current = ctx.state.get_current().await;
    let position_seconds = ctx.engine.position_seconds().await;

    Json(NarrationStatusResponse {
        state: state.to_string(),
        voice: ctx.engine.current_voice().await,
        position_seconds,
        session_id: current.as_ref().map(|c| c.session_id),
        total_chunks: current.as_ref().map(|c| c.total_chunks).unwrap_or(0),
        chunks_completed: current.as_ref().map(|c| c.chunks_completed).unwrap_or(0),
        fallback: current.as_ref().map(|c| c.fallback).unwrap_or(false),
    })
}

// ============================================================================
// Audio Endpoints
// ============================================================================

/// GET /audio/devices - List available audio output devices
pub async fn list_audio_devices() -> Result<Json<DeviceListResponse>, HandlerError> {
    use crate::audio::output::AudioOutput;

    match AudioOutput::list_devices() {
        Ok(devices) => {
            info!("Found {} audio devices", devices.len());
            Ok(Json(DeviceListResponse { devices }))
        }
        Err(e) => {
            error!("Failed to list audio devices: {}", e);
            Err(error_response(e))
        }
    }
}

/// GET /audio/volume - Current volume on the 0-100 user scale
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    let volume = (ctx.engine.get_volume() * 100.0).round() as u8;
    Json(VolumeResponse { volume })
}

/// POST /audio/volume - Set volume on the 0-100 user scale
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(request): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, HandlerError> {
    if request.volume > 100 {
        return Err(error_response(Error::Config("Volume must be 0-100".to_string())));
    }
    ctx.engine.set_volume(request.volume as f32 / 100.0);
    Ok(Json(VolumeResponse { volume: request.volume }))
}
