//! Playback: session clock, gapless scheduler, narration controller

pub mod clock;
pub mod engine;
pub mod events;
pub mod scheduler;

pub use clock::{AudioClock, ClockState};
pub use engine::{NarrationEngine, SinkKind};
pub use scheduler::PlaybackScheduler;
