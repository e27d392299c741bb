//! Gapless playback scheduler
//!
//! Owns the session clock, the next-start cursor, and the set of scheduled
//! sources. Buffers are stamped onto the clock timeline back to back: chunk
//! *i+1* starts exactly where chunk *i* ends while synthesis keeps pace with
//! playback, and at `clock.now()` after a stall (audible gap, never overlap).
//!
//! The render path doubles as the completion detector: when a source's final
//! frame is consumed it is removed from the active set and reported on the
//! event channel, so the controller learns about completion without polling.

use crate::audio::types::ChunkBuffer;
use crate::error::{Error, Result};
use crate::playback::clock::AudioClock;
use crate::playback::events::SchedulerEvent;
use lectern_common::time::frames_to_seconds;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Outcome of scheduling one buffer
#[derive(Debug, Clone)]
pub struct ScheduledHandle {
    pub source_id: Uuid,
    pub chunk_index: usize,
    /// Clock time the buffer will start at, in seconds
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// A buffer stamped onto the clock timeline
struct ScheduledSource {
    source_id: Uuid,
    chunk_index: usize,
    start_frame: u64,
    samples: Vec<f32>,
}

impl ScheduledSource {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

struct SchedulerInner {
    next_start_frame: u64,
    sources: Vec<ScheduledSource>,
}

/// Playback scheduler bound to one session clock.
pub struct PlaybackScheduler {
    clock: Arc<AudioClock>,
    inner: Mutex<SchedulerInner>,
    event_tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl PlaybackScheduler {
    /// Create a scheduler with a fresh running clock at `sample_rate`.
    ///
    /// Returns the scheduler and the receiving end of its completion events.
    pub fn new(sample_rate: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Self {
            clock: Arc::new(AudioClock::new(sample_rate)),
            inner: Mutex::new(SchedulerInner { next_start_frame: 0, sources: Vec::new() }),
            event_tx,
        });
        (scheduler, event_rx)
    }

    /// The session clock
    pub fn clock(&self) -> &Arc<AudioClock> {
        &self.clock
    }

    /// True until `stop()` closes the session clock
    pub fn is_alive(&self) -> bool {
        self.clock.is_alive()
    }

    /// Number of sources scheduled or playing
    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().sources.len()
    }

    /// Current clock position in seconds
    pub fn position_seconds(&self) -> f64 {
        self.clock.now_seconds()
    }

    /// Stamp a buffer onto the timeline.
    ///
    /// Start time is `max(next_start, clock.now())`: back to back while the
    /// producer keeps pace, immediate when it fell behind. Never earlier than
    /// the previous buffer's end, so scheduled audio cannot overlap.
    pub fn schedule(&self, buffer: ChunkBuffer, chunk_index: usize) -> Result<ScheduledHandle> {
        if !self.clock.is_alive() {
            return Err(Error::Playback("Cannot schedule on a stopped session".to_string()));
        }
        if buffer.sample_rate != self.clock.sample_rate() {
            return Err(Error::Playback(format!(
                "Buffer rate {} does not match session clock rate {}",
                buffer.sample_rate,
                self.clock.sample_rate()
            )));
        }
        if buffer.is_empty() {
            return Err(Error::Playback("Cannot schedule an empty buffer".to_string()));
        }

        let now = self.clock.now_frames();
        let mut inner = self.inner.lock().unwrap();

        let start_frame = inner.next_start_frame.max(now);
        let source = ScheduledSource {
            source_id: Uuid::new_v4(),
            chunk_index,
            start_frame,
            samples: buffer.samples,
        };
        let handle = ScheduledHandle {
            source_id: source.source_id,
            chunk_index,
            start_seconds: frames_to_seconds(start_frame, buffer.sample_rate),
            duration_seconds: frames_to_seconds(
                source.samples.len() as u64,
                buffer.sample_rate,
            ),
        };

        inner.next_start_frame = source.end_frame();
        debug!(
            chunk_index,
            start_frame,
            frames = source.samples.len(),
            "Scheduled chunk buffer"
        );
        inner.sources.push(source);

        Ok(handle)
    }

    /// Suspend the session clock.
    ///
    /// Timings and the next-start cursor are untouched; everything resumes
    /// from its frozen position.
    pub fn pause(&self) {
        self.clock.suspend();
    }

    /// Resume a suspended session clock
    pub fn resume(&self) {
        self.clock.resume();
    }

    /// Halt every scheduled source, clear the active set, close the clock,
    /// and reset the next-start cursor. Idempotent.
    ///
    /// Severed sources report no completion; stale continuations checking
    /// `is_alive` see a dead session and discard their results.
    pub fn stop(&self) {
        self.clock.close();
        let mut inner = self.inner.lock().unwrap();
        let dropped = inner.sources.len();
        inner.sources.clear();
        inner.next_start_frame = 0;
        if dropped > 0 {
            debug!(dropped, "Stopped session with sources still scheduled");
        }
    }

    /// Render the next `out.len()` mono frames and advance the clock.
    ///
    /// Called by the output sink. A suspended or closed clock renders silence
    /// without advancing, which is what freezes scheduled timings in place
    /// during pause. Completions detected here are pushed on the event
    /// channel after the inner lock is released.
    pub fn render(&self, out: &mut [f32]) {
        if out.is_empty() {
            return;
        }
        if !self.clock.is_running() {
            out.fill(0.0);
            return;
        }

        let start = self.clock.now_frames();
        let end = start + out.len() as u64;
        let mut completed = Vec::new();

        {
            let mut inner = self.inner.lock().unwrap();

            for (offset, slot) in out.iter_mut().enumerate() {
                let t = start + offset as u64;
                let mut acc = 0.0f32;
                for source in &inner.sources {
                    if t >= source.start_frame && t < source.end_frame() {
                        acc += source.samples[(t - source.start_frame) as usize];
                    }
                }
                *slot = acc.clamp(-1.0, 1.0);
            }

            inner.sources.retain(|source| {
                if source.end_frame() <= end {
                    completed.push((source.source_id, source.chunk_index));
                    false
                } else {
                    true
                }
            });

            let active_remaining = inner.sources.len();
            drop(inner);

            self.clock.advance(out.len() as u64);

            for (source_id, chunk_index) in completed {
                trace!(chunk_index, "Source playback complete");
                let _ = self.event_tx.send(SchedulerEvent::SourceCompleted {
                    source_id,
                    chunk_index,
                    active_remaining,
                });
            }
        }
    }
}
