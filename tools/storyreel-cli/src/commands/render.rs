//! Render a whole project: compose every scene, join, card, export.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storyreel_common::config::AssemblyConfig;
use storyreel_render_engine::{AssemblyEngine, SceneRequest, TitleCards};
use storyreel_scene_model::profile::{ContainerFormat, ExportProfile, QualityProfile};

use super::{export::print_report, load_manifest, manifest_dir};

/// Project manifest consumed by `storyreel render`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub scenes: Vec<SceneRequest>,

    #[serde(default = "default_output_name")]
    pub output_name: String,

    #[serde(default = "default_formats")]
    pub formats: Vec<ContainerFormat>,

    #[serde(default = "default_qualities")]
    pub qualities: Vec<QualityProfile>,

    #[serde(default)]
    pub include_transitions: bool,

    #[serde(default)]
    pub cards: TitleCards,
}

fn default_output_name() -> String {
    "final".to_string()
}

fn default_formats() -> Vec<ContainerFormat> {
    vec![ContainerFormat::Mp4]
}

fn default_qualities() -> Vec<QualityProfile> {
    vec![QualityProfile::High]
}

impl ProjectManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut manifest: Self = load_manifest(path)?;
        if manifest.scenes.is_empty() {
            anyhow::bail!("Project {} has no scenes", path.display());
        }
        let base = manifest_dir(path);
        for scene in &mut manifest.scenes {
            scene.resolve_paths(&base);
        }
        Ok(manifest)
    }
}

pub async fn run(config: AssemblyConfig, path: PathBuf) -> anyhow::Result<()> {
    let manifest = ProjectManifest::load(&path)?;
    let engine = AssemblyEngine::with_ffmpeg(config)?;

    println!("Rendering project: {}", path.display());
    println!("  Scenes: {}", manifest.scenes.len());

    let ids: Vec<String> = manifest.scenes.iter().map(|s| s.scene.id.clone()).collect();
    let results = engine.compose_scenes(manifest.scenes.clone()).await;

    let mut clips = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(output) => {
                println!(
                    "  [OK]   {id}: {:.3}s -> {}",
                    output.clip.duration_secs,
                    output.clip.path.display()
                );
                for warning in &output.warnings {
                    println!("         [WARN] {} skipped: {}", warning.stage, warning.message);
                }
                clips.push(output.clip);
            }
            Err(e) => {
                println!("  [FAIL] {id}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} scene(s) failed to compose");
    }

    let mut video = engine
        .create_video_from_scenes(&clips, &manifest.output_name, manifest.include_transitions)
        .await?;
    println!(
        "  Joined: {} ({:.3}s)",
        video.path.display(),
        video.duration_secs
    );

    if !manifest.cards.is_empty() {
        match engine.add_title_cards(&video, &manifest.cards).await {
            Ok(carded) => {
                println!("  Cards:  {}", carded.path.display());
                video = carded;
            }
            Err(degraded) => {
                let warning = degraded.warning();
                println!("  [WARN] {} skipped: {}", warning.stage, warning.message);
                video = degraded.into_clip();
            }
        }
    }

    let profiles = ExportProfile::matrix(&manifest.formats, &manifest.qualities);
    let report = engine.export_video(&video, &profiles).await?;
    print_report(&report);
    tracing::info!(
        scenes = clips.len(),
        exported = report.outputs.len(),
        failed = report.failures.len(),
        "Project rendered"
    );
    if report.outputs.is_empty() {
        anyhow::bail!("Every export failed");
    }
    Ok(())
}
