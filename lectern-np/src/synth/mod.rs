//! Synthesis boundary: networked speech synthesis and the degraded fallback

pub mod client;
pub mod fallback;

pub use client::{HttpSynthesizer, SpeechSynthesizer};
pub use fallback::{strip_markup, FallbackSpeech, SystemSpeech};
