//! Rendered video clip records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A rendered video file and its known properties.
///
/// Clips are never mutated after creation. The caller owns the underlying
/// file and is free to move or delete it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
}

impl VideoClip {
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            duration_secs,
            width,
            height,
            audio_path: None,
        }
    }

    /// Same clip properties, different file.
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    /// Same clip, with the dubbed audio source recorded.
    pub fn with_audio(&self, audio_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: Some(audio_path.into()),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem, used to derive names of follow-up artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocated_keeps_properties() {
        let clip = VideoClip::new("/tmp/scene_a.mp4", 6.5, 1920, 1080);
        let moved = clip.relocated("/tmp/dialogue_scene_a.mp4");
        assert_eq!(moved.duration_secs, 6.5);
        assert_eq!(moved.width, 1920);
        assert_eq!(moved.stem(), "dialogue_scene_a");
        assert_eq!(clip.path(), Path::new("/tmp/scene_a.mp4"));
    }

    #[test]
    fn test_stem_fallback() {
        let clip = VideoClip::new("/", 1.0, 1, 1);
        assert_eq!(clip.stem(), "video");
    }
}
