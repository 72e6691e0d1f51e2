//! Frame timing and output naming utilities.
//!
//! Scene timing is expressed in seconds on the dialogue timeline and in
//! frames once encoded. This module provides:
//! - Conversions between seconds, milliseconds, and frames
//! - The one-frame tolerance used when comparing encoded durations
//! - Collision-resistant tokens for intermediate output filenames

use std::sync::atomic::{AtomicU64, Ordering};

/// Converts between timeline seconds and encoded frames at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    fps: u32,
}

impl FrameClock {
    /// Create a clock for the given frame rate. Zero is treated as 1 fps.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Duration of a single frame in seconds.
    pub fn frame_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Number of frames needed to cover `secs` (rounded up).
    pub fn frames_for(&self, secs: f64) -> u64 {
        if secs <= 0.0 {
            return 0;
        }
        (secs * self.fps as f64).ceil() as u64
    }

    /// Whether two durations agree within one frame.
    pub fn within_one_frame(&self, a_secs: f64, b_secs: f64) -> bool {
        (a_secs - b_secs).abs() <= self.frame_secs() + 1e-9
    }

    /// Convert seconds to whole milliseconds (truncating).
    pub fn secs_to_ms(secs: f64) -> u64 {
        if secs <= 0.0 {
            return 0;
        }
        (secs * 1000.0 + 1e-6).floor() as u64
    }

    /// Convert milliseconds to seconds.
    pub fn ms_to_secs(ms: u64) -> f64 {
        ms as f64 / 1000.0
    }
}

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Build a filename-safe token that is unique across concurrent writers.
///
/// The token joins the sanitized `parts`, a UTC timestamp with microsecond
/// precision, and a process-wide sequence number.
pub fn output_token(parts: &[&str]) -> String {
    let seq = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%6f");
    let mut token = parts
        .iter()
        .map(|part| sanitize_component(part))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if !token.is_empty() {
        token.push('_');
    }
    format!("{token}{stamp}_{seq:04}")
}

/// Replace anything that is not ASCII alphanumeric, `-` or `_` with `_`.
pub fn sanitize_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_for_rounds_up() {
        let clock = FrameClock::new(24);
        assert_eq!(clock.frames_for(1.0), 24);
        assert_eq!(clock.frames_for(1.01), 25);
        assert_eq!(clock.frames_for(0.0), 0);
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        assert_eq!(FrameClock::new(0).fps(), 1);
    }

    #[test]
    fn test_within_one_frame() {
        let clock = FrameClock::new(25);
        assert!(clock.within_one_frame(6.5, 6.54));
        assert!(!clock.within_one_frame(6.5, 6.6));
    }

    #[test]
    fn test_ms_conversion() {
        assert_eq!(FrameClock::secs_to_ms(1.0), 1000);
        assert_eq!(FrameClock::secs_to_ms(5.5), 5500);
        assert_eq!(FrameClock::secs_to_ms(0.3), 300);
        assert_eq!(FrameClock::secs_to_ms(-2.0), 0);
        assert!((FrameClock::ms_to_secs(1500) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_output_tokens_are_unique() {
        let a = output_token(&["scene", "intro"]);
        let b = output_token(&["scene", "intro"]);
        assert_ne!(a, b);
        assert!(a.starts_with("scene_intro_"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Alice / Bob"), "Alice___Bob");
        assert_eq!(sanitize_component(" ch-1_a "), "ch-1_a");
    }
}
