//! Join composed scene videos.

use std::path::PathBuf;

use storyreel_common::config::AssemblyConfig;
use storyreel_render_engine::AssemblyEngine;

use super::clip_from_file;

pub async fn run(
    config: AssemblyConfig,
    clips: Vec<PathBuf>,
    output: String,
    transitions: bool,
) -> anyhow::Result<()> {
    let engine = AssemblyEngine::with_ffmpeg(config)?;

    let mut scenes = Vec::with_capacity(clips.len());
    for path in &clips {
        scenes.push(clip_from_file(&engine, path).await?);
    }

    println!("Joining {} scene(s)", scenes.len());
    let combined = engine
        .create_video_from_scenes(&scenes, &output, transitions)
        .await?;
    println!(
        "Joined: {} ({:.3}s)",
        combined.path.display(),
        combined.duration_secs
    );
    Ok(())
}
