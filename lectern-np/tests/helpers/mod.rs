//! Shared test helpers: scripted synthesizer and fallback doubles

use async_trait::async_trait;
use base64::Engine;
use lectern_np::error::{Error, Result};
use lectern_np::playback::engine::{EngineOptions, NarrationEngine, SinkKind};
use lectern_np::state::SharedState;
use lectern_np::synth::{FallbackSpeech, SpeechSynthesizer};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Base64-encode `frames` of silent 16-bit PCM
pub fn silence_base64(frames: usize) -> String {
    base64::engine::general_purpose::STANDARD.encode(vec![0u8; frames * 2])
}

/// Per-request behavior of the scripted synthesizer
#[derive(Debug, Clone)]
pub enum ChunkScript {
    /// Succeed with `frames` of silent PCM
    Audio(usize),
    /// Fail with a synthesis error
    Fail,
    /// Never resolve (simulated network stall)
    Stall,
}

/// Synthesizer double that follows a per-call script and records requests
pub struct MockSynthesizer {
    script: Vec<ChunkScript>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockSynthesizer {
    pub fn new(script: Vec<ChunkScript>) -> Arc<Self> {
        Arc::new(Self { script, calls: Mutex::new(Vec::new()) })
    }

    /// Requests seen so far, as (text, voice) pairs
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((text.to_string(), voice_id.to_string()));
            calls.len() - 1
        };

        match self.script.get(index).cloned().unwrap_or(ChunkScript::Audio(2400)) {
            ChunkScript::Audio(frames) => Ok(silence_base64(frames)),
            ChunkScript::Fail => Err(Error::Synthesis("scripted failure".to_string())),
            ChunkScript::Stall => {
                futures::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }
}

/// Fallback double that records the narrated text
pub struct MockFallback {
    calls: Mutex<Vec<String>>,
    /// Block until cancelled instead of completing immediately
    hold_until_cancel: bool,
}

impl MockFallback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), hold_until_cancel: false })
    }

    pub fn holding() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), hold_until_cancel: true })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl FallbackSpeech for MockFallback {
    async fn speak(&self, text: &str, mut cancel: watch::Receiver<bool>) -> Result<()> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.hold_until_cancel {
            let _ = cancel.wait_for(|stopped| *stopped).await;
        }
        Ok(())
    }
}

/// Engine wired with a null sink and the given doubles
pub fn test_engine(
    synthesizer: Arc<MockSynthesizer>,
    fallback: Arc<MockFallback>,
) -> (Arc<NarrationEngine>, Arc<SharedState>) {
    let state = Arc::new(SharedState::new());
    let engine = Arc::new(NarrationEngine::new(
        Arc::clone(&state),
        synthesizer,
        fallback,
        EngineOptions { sink: SinkKind::Null, default_voice: "Kore".to_string() },
    ));
    (engine, state)
}
