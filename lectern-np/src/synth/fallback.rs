//! Degraded fallback narration
//!
//! When the chunked synthesis pipeline fails, the whole original text is
//! narrated in one shot by the platform's speech program. No chunking, no
//! gapless scheduling; the session reports Speaking for the program's coarse
//! duration and cancellation kills the process.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Words-per-minute baseline of the speech program at rate 1.0
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Non-chunked narration of a whole text, cancellable via the watch channel.
#[async_trait]
pub trait FallbackSpeech: Send + Sync {
    /// Narrate `text` to completion. Resolves when narration ends or the
    /// cancel signal flips to true (cancellation is not an error).
    async fn speak(&self, text: &str, cancel: watch::Receiver<bool>) -> Result<()>;
}

/// Strip markup characters the speech program would read aloud
pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '#' | '*')).collect()
}

/// Platform speech program wrapper (`espeak-ng` on Linux, `say` on macOS).
pub struct SystemSpeech {
    program: String,
    words_per_minute: u32,
}

impl SystemSpeech {
    /// Create a wrapper for `program` (None picks the platform default) at
    /// the given speech-rate multiplier.
    pub fn new(program: Option<String>, rate: f32) -> Self {
        let program = program.unwrap_or_else(|| Self::default_program().to_string());
        let words_per_minute = (BASE_WORDS_PER_MINUTE * rate.clamp(0.5, 2.0)) as u32;
        Self { program, words_per_minute }
    }

    fn default_program() -> &'static str {
        if cfg!(target_os = "macos") {
            "say"
        } else {
            "espeak-ng"
        }
    }

    fn uses_stdin(&self) -> bool {
        self.program.contains("espeak")
    }
}

#[async_trait]
impl FallbackSpeech for SystemSpeech {
    async fn speak(&self, text: &str, mut cancel: watch::Receiver<bool>) -> Result<()> {
        debug!(program = %self.program, chars = text.len(), "Starting fallback narration");

        let mut command = Command::new(&self.program);
        command.stdout(Stdio::null()).stderr(Stdio::null());

        if self.uses_stdin() {
            command
                .arg("--stdin")
                .arg("-s")
                .arg(self.words_per_minute.to_string())
                .stdin(Stdio::piped());
        } else {
            command
                .arg("-r")
                .arg(self.words_per_minute.to_string())
                .arg(text)
                .stdin(Stdio::null());
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::Playback(format!("Failed to start speech program '{}': {}", self.program, e)))?;

        if self.uses_stdin() {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| Error::Playback(format!("Failed to feed speech program: {}", e)))?;
                // Dropping stdin closes the pipe so the program starts speaking
            }
        }

        // The wait future borrows the child mutably, so the arms only record
        // the outcome; the child is killed after the select releases it
        let outcome = tokio::select! {
            status = child.wait() => Some(status),
            stopped = cancel.wait_for(|stopped| *stopped) => {
                if stopped.is_err() {
                    warn!("Fallback cancel channel closed; killing speech program");
                }
                None
            }
        };

        match outcome {
            Some(status) => {
                let status = status
                    .map_err(|e| Error::Playback(format!("Speech program wait failed: {}", e)))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::Playback(format!("Speech program exited with {}", status)))
                }
            }
            None => {
                debug!("Fallback narration cancelled");
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(())
            }
        }
    }
}
