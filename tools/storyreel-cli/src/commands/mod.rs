pub mod check;
pub mod compose;
pub mod concat;
pub mod export;
pub mod render;
pub mod validate;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use storyreel_render_engine::{AssemblyEngine, Renderer, SceneRequest};
use storyreel_scene_model::clip::VideoClip;

/// Read a JSON manifest.
pub fn load_manifest<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))
}

/// Directory that relative paths in a manifest are resolved against.
pub fn manifest_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load a scene manifest with asset paths resolved.
pub fn load_scene(path: &Path) -> anyhow::Result<SceneRequest> {
    let mut request: SceneRequest = load_manifest(path)?;
    request.resolve_paths(&manifest_dir(path));
    Ok(request)
}

/// Describe an existing video file using the engine's probe.
pub async fn clip_from_file(engine: &AssemblyEngine, path: &Path) -> anyhow::Result<VideoClip> {
    if !path.is_file() {
        anyhow::bail!("Video not found: {}", path.display());
    }
    let probe = engine
        .renderer()
        .probe(path)
        .await
        .ok_or_else(|| anyhow::anyhow!("Could not read media info from {}", path.display()))?;

    let (width, height) = engine.config().dimensions();
    let mut clip = VideoClip::new(
        path,
        probe.duration_secs.unwrap_or(0.0),
        probe.width.unwrap_or(width),
        probe.height.unwrap_or(height),
    );
    if probe.has_audio {
        clip = clip.with_audio(path);
    }
    Ok(clip)
}
