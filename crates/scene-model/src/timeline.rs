//! Scene timeline derived from dialogue durations.
//!
//! The timeline is never persisted. It is rebuilt from the dialogue lines
//! whenever a scene is composed, and it feeds both the subtitle overlay
//! (visual windows) and the audio mixer (per-line delays).

use serde::{Deserialize, Serialize};
use storyreel_common::clock::FrameClock;
use storyreel_common::error::{StoryreelError, StoryreelResult};

use crate::dialogue::DialogueLine;

/// A half-open time interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeWindow {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Whether `t` falls inside the window. The end is exclusive.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs
    }
}

/// One dialogue line placed on the scene time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub line: DialogueLine,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimelineEntry {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_secs, self.end_secs)
    }

    /// Audio delay for this line in whole milliseconds.
    pub fn delay_ms(&self) -> u64 {
        FrameClock::secs_to_ms(self.start_secs)
    }
}

/// Ordered `(line, start, end)` triples covering the whole scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Place each line after the previous one.
    ///
    /// Fails before any rendering on an empty script, a non-positive (or
    /// non-finite) duration, or line orders that do not strictly increase.
    pub fn build(lines: &[DialogueLine]) -> StoryreelResult<Self> {
        if lines.is_empty() {
            return Err(StoryreelError::EmptyScene);
        }

        let mut previous_order: Option<u32> = None;
        for line in lines {
            if !line.estimated_duration.is_finite() || line.estimated_duration <= 0.0 {
                return Err(StoryreelError::InvalidDuration {
                    order: line.order,
                    duration: line.estimated_duration,
                });
            }
            if let Some(previous) = previous_order {
                if line.order <= previous {
                    return Err(StoryreelError::OutOfOrderLine {
                        order: line.order,
                        previous,
                    });
                }
            }
            previous_order = Some(line.order);
        }

        let mut cursor = 0.0f64;
        let entries = lines
            .iter()
            .map(|line| {
                let start_secs = cursor;
                cursor += line.estimated_duration;
                TimelineEntry {
                    line: line.clone(),
                    start_secs,
                    end_secs: cursor,
                }
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total scene duration: the end of the last line.
    pub fn total_duration(&self) -> f64 {
        self.entries.last().map(|e| e.end_secs).unwrap_or(0.0)
    }

    /// Entries that should be drawn as subtitles.
    pub fn overlay_entries(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter().filter(|e| e.line.has_content())
    }

    /// The entry active at time `t`, if any.
    pub fn entry_at(&self, t: f64) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.window().contains(t))
    }
}
