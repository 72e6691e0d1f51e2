//! Export a video to a format/quality matrix.

use std::path::PathBuf;

use storyreel_common::config::AssemblyConfig;
use storyreel_render_engine::{AssemblyEngine, ExportReport};
use storyreel_scene_model::profile::{ContainerFormat, ExportProfile, QualityProfile};

use super::clip_from_file;

pub async fn run(
    config: AssemblyConfig,
    path: PathBuf,
    formats: Vec<ContainerFormat>,
    qualities: Vec<QualityProfile>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let dir = output.unwrap_or_else(|| config.output_dir.clone());
    let engine = AssemblyEngine::with_ffmpeg(config)?;
    let clip = clip_from_file(&engine, &path).await?;

    let profiles = ExportProfile::matrix(&formats, &qualities);
    println!("Exporting {} to {} profile(s)", path.display(), profiles.len());

    let report = engine.export_video_to(&clip, &profiles, &dir).await?;
    print_report(&report);
    if report.outputs.is_empty() {
        anyhow::bail!("Every export failed");
    }
    Ok(())
}

pub fn print_report(report: &ExportReport) {
    for (profile, path) in report.output_paths() {
        println!("  [OK]   {profile}: {}", path.display());
    }
    for (profile, reason) in &report.failures {
        println!("  [FAIL] {profile}: {reason}");
    }
}
