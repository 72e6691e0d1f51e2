//! Pipeline stage identity and best-effort outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use storyreel_scene_model::clip::VideoClip;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Composite,
    DialogueOverlay,
    AudioMix,
    Concatenate,
    Export,
    TitleCards,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Composite => "composite",
            Self::DialogueOverlay => "dialogue_overlay",
            Self::AudioMix => "audio_mix",
            Self::Concatenate => "concatenate",
            Self::Export => "export",
            Self::TitleCards => "title_cards",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that was skipped, recorded on the scene result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

/// A best-effort stage that failed and handed back its input unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Degraded {
    pub stage: Stage,
    /// The stage input, passed through untouched.
    pub passthrough: VideoClip,
    pub reason: String,
}

impl Degraded {
    pub fn new(stage: Stage, passthrough: &VideoClip, reason: impl Into<String>) -> Self {
        Self {
            stage,
            passthrough: passthrough.clone(),
            reason: reason.into(),
        }
    }

    pub fn warning(&self) -> StageWarning {
        StageWarning {
            stage: self.stage,
            message: self.reason.clone(),
        }
    }

    pub fn into_clip(self) -> VideoClip {
        self.passthrough
    }
}

/// Result of a best-effort stage: either its own output or a degraded
/// passthrough of its input. Never an error.
pub type BestEffort = Result<VideoClip, Degraded>;
