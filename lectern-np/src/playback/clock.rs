//! Session audio clock
//!
//! The timing authority against which buffer start times are computed. The
//! clock advances only when the output sink renders frames, so its "now"
//! tracks the device's realtime consumption rather than the control threads.
//! One clock is created per narration session and closed when the session
//! ends; asynchronous continuations use `is_alive` as their liveness check so
//! late results from a stopped session never touch a dead timeline.

use std::sync::Mutex;

/// Clock lifecycle state
///
/// `Closed` is terminal: a session whose clock is closed is stopped for good
/// and a new session must create a fresh clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Running,
    Suspended,
    Closed,
}

/// Frame-counting clock bound to a fixed sample rate.
#[derive(Debug)]
pub struct AudioClock {
    sample_rate: u32,
    inner: Mutex<ClockInner>,
}

#[derive(Debug)]
struct ClockInner {
    state: ClockState,
    frames: u64,
}

impl AudioClock {
    /// Create a running clock at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            inner: Mutex::new(ClockInner { state: ClockState::Running, frames: 0 }),
        }
    }

    /// Sample rate this clock counts frames at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current clock position in frames
    pub fn now_frames(&self) -> u64 {
        self.inner.lock().unwrap().frames
    }

    /// Current clock position in seconds
    pub fn now_seconds(&self) -> f64 {
        lectern_common::time::frames_to_seconds(self.now_frames(), self.sample_rate)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClockState {
        self.inner.lock().unwrap().state
    }

    /// True while the clock is advancing (not suspended, not closed)
    pub fn is_running(&self) -> bool {
        self.state() == ClockState::Running
    }

    /// True until the clock is closed
    pub fn is_alive(&self) -> bool {
        self.state() != ClockState::Closed
    }

    /// Advance the clock by `frames` rendered frames.
    ///
    /// Only the output sink calls this, and only while the clock is running;
    /// advancing a suspended or closed clock is ignored.
    pub fn advance(&self, frames: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == ClockState::Running {
            inner.frames += frames;
        }
    }

    /// Freeze the timeline. Scheduled timings are untouched; they resume from
    /// their frozen positions because all timings are relative to clock time.
    pub fn suspend(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == ClockState::Running {
            inner.state = ClockState::Suspended;
        }
    }

    /// Unfreeze a suspended timeline
    pub fn resume(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == ClockState::Suspended {
            inner.state = ClockState::Running;
        }
    }

    /// Close the clock. Terminal and idempotent.
    pub fn close(&self) {
        self.inner.lock().unwrap().state = ClockState::Closed;
    }
}
