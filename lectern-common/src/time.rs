//! Timestamp and audio-time utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Convert a frame count at a sample rate to seconds
pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate as f64
}

/// Convert seconds to a frame count at a sample rate (rounded to nearest)
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        // Second call should be after first call
        assert!(time2 > time1);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::from_millis(0));
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(3_600_000), Duration::from_secs(3600));
    }

    #[test]
    fn test_frames_seconds_conversion() {
        assert_eq!(frames_to_seconds(24000, 24000), 1.0);
        assert_eq!(frames_to_seconds(12000, 24000), 0.5);
        assert_eq!(seconds_to_frames(1.0, 24000), 24000);
        assert_eq!(seconds_to_frames(0.5, 24000), 12000);
    }

    #[test]
    fn test_frames_seconds_roundtrip() {
        let frames = 48_013u64;
        let seconds = frames_to_seconds(frames, 24000);
        assert_eq!(seconds_to_frames(seconds, 24000), frames);
    }
}
