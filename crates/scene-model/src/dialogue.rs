//! Dialogue lines produced by upstream script generation.

use serde::{Deserialize, Serialize};

/// One line of a scene script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Position within the scene. Strictly increasing.
    pub order: u32,

    /// Spoken or narrated text. Blank lines keep their duration but draw nothing.
    #[serde(default)]
    pub content: String,

    /// Speaker name. `None` marks narration.
    #[serde(default)]
    pub character_name: Option<String>,

    #[serde(default)]
    pub emotion: Emotion,

    /// Where the speaker stands on screen.
    #[serde(default)]
    pub position: ScreenPosition,

    /// Estimated spoken duration in seconds.
    pub estimated_duration: f64,
}

impl DialogueLine {
    /// A spoken line with neutral emotion at the center position.
    pub fn spoken(
        order: u32,
        character: impl Into<String>,
        content: impl Into<String>,
        estimated_duration: f64,
    ) -> Self {
        Self {
            order,
            content: content.into(),
            character_name: Some(character.into()),
            emotion: Emotion::Neutral,
            position: ScreenPosition::Center,
            estimated_duration,
        }
    }

    /// A narration line (no speaker).
    pub fn narration(order: u32, content: impl Into<String>, estimated_duration: f64) -> Self {
        Self {
            order,
            content: content.into(),
            character_name: None,
            emotion: Emotion::Neutral,
            position: ScreenPosition::Center,
            estimated_duration,
        }
    }

    pub fn with_position(mut self, position: ScreenPosition) -> Self {
        self.position = position;
        self
    }

    /// Whether this line has no speaker.
    pub fn is_narration(&self) -> bool {
        self.character_name
            .as_deref()
            .map(|name| name.trim().is_empty())
            .unwrap_or(true)
    }

    /// Whether this line has text worth drawing.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// The speaker name, if any.
    pub fn speaker(&self) -> Option<&str> {
        if self.is_narration() {
            None
        } else {
            self.character_name.as_deref()
        }
    }
}

/// Emotional tone of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Excited,
    Thoughtful,
}

/// Logical on-screen slot for a character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenPosition {
    Left,
    #[default]
    Center,
    Right,
}

impl ScreenPosition {
    /// Top-left pixel offset at the 1920x1080 reference resolution.
    pub fn reference_offset(self) -> (i32, i32) {
        match self {
            Self::Left => (200, 150),
            Self::Center => (760, 150),
            Self::Right => (1320, 150),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narration_detection() {
        assert!(DialogueLine::narration(1, "The rain fell.", 2.0).is_narration());
        assert!(!DialogueLine::spoken(1, "Alice", "Hi", 1.0).is_narration());

        let mut blank_speaker = DialogueLine::spoken(1, "  ", "Hi", 1.0);
        assert!(blank_speaker.is_narration());
        blank_speaker.character_name = None;
        assert_eq!(blank_speaker.speaker(), None);
    }

    #[test]
    fn test_has_content() {
        assert!(!DialogueLine::narration(1, "   \n", 1.0).has_content());
        assert!(DialogueLine::narration(1, "...", 1.0).has_content());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let line: DialogueLine = serde_json::from_str(
            r#"{"order": 2, "content": "Hello", "character_name": "Bob", "estimated_duration": 1.5}"#,
        )
        .unwrap();
        assert_eq!(line.emotion, Emotion::Neutral);
        assert_eq!(line.position, ScreenPosition::Center);

        let line: DialogueLine = serde_json::from_str(
            r#"{"order": 3, "emotion": "angry", "position": "left", "estimated_duration": 1.0}"#,
        )
        .unwrap();
        assert!(line.is_narration());
        assert_eq!(line.position, ScreenPosition::Left);
        assert_eq!(line.emotion, Emotion::Angry);
    }
}
