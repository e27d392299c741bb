//! Narration Player (lectern-np) - Main entry point
//!
//! Runs the streaming narration engine behind an HTTP/SSE control interface:
//! clients POST text, the engine chunks it, synthesizes audio per chunk, and
//! plays the buffers gaplessly on the configured output device.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lectern_np::api::{create_router, AppContext};
use lectern_np::config::{
    Config, DEFAULT_PORT, DEFAULT_SYNTHESIS_ENDPOINT, DEFAULT_SYNTHESIS_MODEL, DEFAULT_VOICE,
};
use lectern_np::playback::engine::{EngineOptions, NarrationEngine, SinkKind};
use lectern_np::state::SharedState;
use lectern_np::synth::{HttpSynthesizer, SystemSpeech};

/// Command-line arguments for lectern-np
#[derive(Parser, Debug)]
#[command(name = "lectern-np")]
#[command(about = "Streaming narration player for Lectern")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "LECTERN_NP_PORT")]
    port: u16,

    /// Default synthesis voice
    #[arg(long, default_value = DEFAULT_VOICE, env = "LECTERN_VOICE")]
    voice: String,

    /// Audio output device name (default device when omitted)
    #[arg(long, env = "LECTERN_AUDIO_DEVICE")]
    device: Option<String>,

    /// Run without an audio device (clock-driven null sink)
    #[arg(long, env = "LECTERN_HEADLESS")]
    headless: bool,

    /// Synthesis endpoint base URL
    #[arg(long, default_value = DEFAULT_SYNTHESIS_ENDPOINT, env = "LECTERN_SYNTHESIS_ENDPOINT")]
    synthesis_endpoint: String,

    /// Synthesis model identifier
    #[arg(long, default_value = DEFAULT_SYNTHESIS_MODEL, env = "LECTERN_SYNTHESIS_MODEL")]
    synthesis_model: String,

    /// Synthesis API key (falls back to $LECTERN_API_KEY, then the config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Speech program for the fallback path (espeak-ng / say when omitted)
    #[arg(long, env = "LECTERN_FALLBACK_PROGRAM")]
    fallback_program: Option<String>,

    /// Speech-rate multiplier for the fallback path
    #[arg(long, default_value_t = 1.0, env = "LECTERN_FALLBACK_RATE")]
    fallback_rate: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lectern_np=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let api_key = match lectern_common::config::resolve_api_key(
        args.api_key.as_deref(),
        "LECTERN_API_KEY",
    ) {
        Ok(key) => key,
        Err(e) => {
            // The chunked path will fail without a key; every session will
            // land on the fallback narrator
            warn!("{e}; chunked synthesis will be unavailable");
            String::new()
        }
    };

    let config = Config {
        port: args.port,
        default_voice: args.voice,
        sink: if args.headless {
            SinkKind::Null
        } else {
            SinkKind::Device(args.device)
        },
        synthesis_endpoint: args.synthesis_endpoint,
        synthesis_model: args.synthesis_model,
        api_key,
        fallback_program: args.fallback_program,
        fallback_rate: args.fallback_rate,
    };

    info!("Starting Lectern Narration Player on port {}", config.port);

    let synthesizer = Arc::new(
        HttpSynthesizer::new(
            config.synthesis_endpoint.clone(),
            config.synthesis_model.clone(),
            config.api_key.clone(),
        )
        .context("Failed to build synthesis client")?,
    );
    let fallback = Arc::new(SystemSpeech::new(
        config.fallback_program.clone(),
        config.fallback_rate,
    ));

    let state = Arc::new(SharedState::new());
    let engine = Arc::new(NarrationEngine::new(
        Arc::clone(&state),
        synthesizer,
        fallback,
        EngineOptions {
            sink: config.sink.clone(),
            default_voice: config.default_voice.clone(),
        },
    ));
    info!("Narration engine initialized (voice: {})", config.default_voice);

    // Build the application router
    let app = create_router(AppContext { state, engine });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
