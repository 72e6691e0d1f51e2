//! Compose a single scene.

use std::path::PathBuf;

use storyreel_common::config::AssemblyConfig;
use storyreel_render_engine::AssemblyEngine;

use super::load_scene;

pub async fn run(config: AssemblyConfig, path: PathBuf) -> anyhow::Result<()> {
    let request = load_scene(&path)?;
    let engine = AssemblyEngine::with_ffmpeg(config)?;

    println!("Composing scene: {}", request.scene.id);
    let output = engine.compose_scene(&request).await?;

    println!("  Output: {}", output.clip.path.display());
    println!(
        "  Duration: {:.3}s ({}x{})",
        output.clip.duration_secs, output.clip.width, output.clip.height
    );
    for warning in &output.warnings {
        println!("  [WARN] {} skipped: {}", warning.stage, warning.message);
    }
    Ok(())
}
