//! Scene scripts and character placement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use storyreel_common::error::StoryreelResult;

use crate::dialogue::{DialogueLine, ScreenPosition};
use crate::timeline::Timeline;

/// One contiguous unit of video: a script plus character placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Identifier embedded in output filenames.
    pub id: String,

    /// Ordered dialogue lines.
    pub lines: Vec<DialogueLine>,

    /// Explicit placement overrides per character.
    #[serde(default)]
    pub positions: BTreeMap<String, ScreenPosition>,
}

impl Scene {
    pub fn new(id: impl Into<String>, lines: Vec<DialogueLine>) -> Self {
        Self {
            id: id.into(),
            lines,
            positions: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, character: impl Into<String>, slot: ScreenPosition) -> Self {
        self.positions.insert(character.into(), slot);
        self
    }

    /// Where a character stands: an explicit override, else the slot of the
    /// character's first line, else center.
    pub fn character_position(&self, character: &str) -> ScreenPosition {
        if let Some(slot) = self.positions.get(character) {
            return *slot;
        }
        self.lines
            .iter()
            .find(|line| line.speaker() == Some(character))
            .map(|line| line.position)
            .unwrap_or_default()
    }

    /// Distinct speakers in order of first appearance.
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = Vec::new();
        for name in self.lines.iter().filter_map(|line| line.speaker()) {
            if !speakers.contains(&name) {
                speakers.push(name);
            }
        }
        speakers
    }

    pub fn timeline(&self) -> StoryreelResult<Timeline> {
        Timeline::build(&self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scene() -> Scene {
        Scene::new(
            "cafe",
            vec![
                DialogueLine::narration(1, "A quiet cafe.", 2.0),
                DialogueLine::spoken(2, "Alice", "Morning!", 1.0)
                    .with_position(ScreenPosition::Left),
                DialogueLine::spoken(3, "Bob", "Hey.", 1.0).with_position(ScreenPosition::Right),
                DialogueLine::spoken(4, "Alice", "Coffee?", 1.5)
                    .with_position(ScreenPosition::Center),
            ],
        )
    }

    #[test]
    fn test_position_from_first_line() {
        let scene = sample_scene();
        assert_eq!(scene.character_position("Alice"), ScreenPosition::Left);
        assert_eq!(scene.character_position("Bob"), ScreenPosition::Right);
        assert_eq!(scene.character_position("Carol"), ScreenPosition::Center);
    }

    #[test]
    fn test_explicit_position_wins() {
        let scene = sample_scene().with_position("Alice", ScreenPosition::Right);
        assert_eq!(scene.character_position("Alice"), ScreenPosition::Right);
    }

    #[test]
    fn test_speakers_in_order() {
        assert_eq!(sample_scene().speakers(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_scene_timeline() {
        let timeline = sample_scene().timeline().unwrap();
        assert!((timeline.total_duration() - 5.5).abs() < 1e-9);
    }
}
