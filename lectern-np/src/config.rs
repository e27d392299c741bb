//! lectern-np specific configuration

use crate::playback::engine::SinkKind;

/// Default HTTP port for the narration player
pub const DEFAULT_PORT: u16 = 5750;

/// Default synthesis endpoint
pub const DEFAULT_SYNTHESIS_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default synthesis model identifier
pub const DEFAULT_SYNTHESIS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default prebuilt synthesis voice
pub const DEFAULT_VOICE: &str = "Kore";

/// Narration player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub default_voice: String,
    pub sink: SinkKind,
    pub synthesis_endpoint: String,
    pub synthesis_model: String,
    pub api_key: String,
    pub fallback_program: Option<String>,
    pub fallback_rate: f32,
}
