//! Error types shared across Storyreel crates.

use std::path::PathBuf;

/// Top-level error type for Storyreel operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryreelError {
    #[error("Scene has no dialogue lines")]
    EmptyScene,

    #[error("Dialogue line {order} has invalid duration {duration}")]
    InvalidDuration { order: u32, duration: f64 },

    #[error("Dialogue line {order} does not follow line {previous}")]
    OutOfOrderLine { order: u32, previous: u32 },

    #[error("Missing asset: {path}")]
    MissingAsset { path: PathBuf },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Scene composition failed: {message}")]
    CompositionFailed { message: String },

    #[error("Scene concatenation failed: {message}")]
    ConcatenationFailed { message: String },

    #[error("Renderer invocation failed: {message}")]
    RendererInvocation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoryreelError.
pub type StoryreelResult<T> = Result<T, StoryreelError>;

impl StoryreelError {
    pub fn missing_asset(path: impl Into<PathBuf>) -> Self {
        Self::MissingAsset { path: path.into() }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::CompositionFailed {
            message: msg.into(),
        }
    }

    pub fn concatenation(msg: impl Into<String>) -> Self {
        Self::ConcatenationFailed {
            message: msg.into(),
        }
    }

    pub fn renderer(msg: impl Into<String>) -> Self {
        Self::RendererInvocation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error was raised while validating caller input, i.e.
    /// before any renderer process could have been spawned.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::EmptyScene
                | Self::InvalidDuration { .. }
                | Self::OutOfOrderLine { .. }
                | Self::MissingAsset { .. }
                | Self::InvalidInput { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_class() {
        assert!(StoryreelError::EmptyScene.is_invalid_input());
        assert!(StoryreelError::missing_asset("/nope.png").is_invalid_input());
        assert!(StoryreelError::InvalidDuration {
            order: 1,
            duration: 0.0
        }
        .is_invalid_input());
        assert!(!StoryreelError::composition("ffmpeg exited 1").is_invalid_input());
        assert!(!StoryreelError::concatenation("boom").is_invalid_input());
    }

    #[test]
    fn test_display_messages() {
        let err = StoryreelError::InvalidDuration {
            order: 3,
            duration: -1.0,
        };
        assert_eq!(err.to_string(), "Dialogue line 3 has invalid duration -1");

        let err = StoryreelError::missing_asset("/assets/bg.png");
        assert_eq!(err.to_string(), "Missing asset: /assets/bg.png");
    }
}
