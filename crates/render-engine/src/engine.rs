//! Assembly engine: the public entry point tying the stages together.
//!
//! ```text
//! SceneRequest ─► Timeline ─► LayerCompositor ─► DialogueOverlay ─► AudioMixer ─► SceneOutput
//!                  (fatal)        (fatal)          (best-effort)     (best-effort)
//!
//! [VideoClip] ─► SceneConcatenator ─► VideoClip ─► Exporter ─► ExportReport
//!                    (fatal)                      (per pair)
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use storyreel_common::clock::output_token;
use storyreel_common::config::AssemblyConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_scene_model::clip::VideoClip;
use storyreel_scene_model::profile::ExportProfile;
use storyreel_scene_model::scene::Scene;
use storyreel_scene_model::timeline::Timeline;

use crate::audio_mix::AudioMixer;
use crate::cards::{TitleCardRenderer, TitleCards};
use crate::compositor::LayerCompositor;
use crate::concat::{ConcatStrategy, SceneConcatenator, Transition};
use crate::export::{ExportReport, Exporter};
use crate::ffmpeg::FfmpegRenderer;
use crate::overlay::DialogueOverlay;
use crate::renderer::{Renderer, ThrottledRenderer};
use crate::stage::{BestEffort, StageWarning};

/// Everything needed to compose one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRequest {
    pub scene: Scene,

    /// Background image or video.
    pub background: PathBuf,

    /// Character name to animation or still image.
    #[serde(default)]
    pub character_clips: BTreeMap<String, PathBuf>,

    /// Character name to spoken dialogue audio.
    #[serde(default)]
    pub audio_clips: BTreeMap<String, PathBuf>,
}

impl SceneRequest {
    pub fn new(scene: Scene, background: impl Into<PathBuf>) -> Self {
        Self {
            scene,
            background: background.into(),
            character_clips: BTreeMap::new(),
            audio_clips: BTreeMap::new(),
        }
    }

    pub fn with_character(mut self, name: impl Into<String>, clip: impl Into<PathBuf>) -> Self {
        self.character_clips.insert(name.into(), clip.into());
        self
    }

    pub fn with_audio(mut self, name: impl Into<String>, clip: impl Into<PathBuf>) -> Self {
        self.audio_clips.insert(name.into(), clip.into());
        self
    }

    /// Make relative asset paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.background);
        self.character_clips.values_mut().for_each(resolve);
        self.audio_clips.values_mut().for_each(resolve);
    }
}

/// A composed scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneOutput {
    pub clip: VideoClip,
    pub timeline: Timeline,
    /// Best-effort stages that were skipped.
    pub warnings: Vec<StageWarning>,
}

impl SceneOutput {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Composes, joins and exports scenes with one configuration.
///
/// Clones share the same renderer throttle.
#[derive(Clone)]
pub struct AssemblyEngine {
    config: Arc<AssemblyConfig>,
    renderer: Arc<dyn Renderer>,
}

impl AssemblyEngine {
    /// Build an engine around `renderer`, capping concurrent renders at
    /// `config.max_concurrent_renders`.
    pub fn new(config: AssemblyConfig, renderer: Arc<dyn Renderer>) -> StoryreelResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.output_dir)?;
        std::fs::create_dir_all(&config.temp_dir)?;

        let throttled = ThrottledRenderer::new(renderer, config.max_concurrent_renders);
        tracing::debug!(
            renderer = throttled.name(),
            max_concurrent = throttled.limit(),
            output_dir = %config.output_dir.display(),
            temp_dir = %config.temp_dir.display(),
            "Assembly engine ready"
        );
        Ok(Self {
            config: Arc::new(config),
            renderer: Arc::new(throttled),
        })
    }

    /// Engine backed by the ffmpeg binaries named in `config`.
    pub fn with_ffmpeg(config: AssemblyConfig) -> StoryreelResult<Self> {
        let renderer = FfmpegRenderer::from_config(&config);
        if !renderer.is_available() {
            return Err(StoryreelError::unsupported(format!(
                "Renderer binary not found: {}",
                renderer.ffmpeg_binary()
            )));
        }
        Self::new(config, Arc::new(renderer))
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Compose one scene: layers, then dialogue overlay, then audio.
    ///
    /// Input errors are raised before any render starts. The overlay and
    /// the audio mix may be skipped; skipped stages are listed in
    /// [`SceneOutput::warnings`].
    pub async fn compose_scene(&self, request: &SceneRequest) -> StoryreelResult<SceneOutput> {
        let scene = &request.scene;
        let timeline = scene.timeline()?;
        let duration = timeline.total_duration();
        let (width, height) = self.config.dimensions();

        let compositor =
            LayerCompositor::new(self.renderer.clone(), width, height, self.config.fps);
        let stack = compositor.build_stack(
            scene,
            &request.background,
            &request.character_clips,
            duration,
        )?;

        let token = output_token(&["scene", &scene.id]);
        let temp = &self.config.temp_dir;
        std::fs::create_dir_all(temp)?;

        tracing::info!(
            scene = %scene.id,
            lines = timeline.len(),
            duration_secs = duration,
            characters = stack.overlays().len(),
            "Composing scene"
        );

        let mut warnings = Vec::new();
        let composite = compositor
            .compose(&stack, &temp.join(format!("{token}.mp4")))
            .await?;

        let overlay = DialogueOverlay::new(self.renderer.clone(), width, height)
            .with_font(self.config.font_file.clone());
        let subtitled = settle(
            overlay
                .render(
                    &composite,
                    &timeline,
                    &temp.join(format!("dialogue_{token}.mp4")),
                )
                .await,
            &mut warnings,
        );

        let mixer = AudioMixer::new(self.renderer.clone());
        let clip = settle(
            mixer
                .mix(
                    &subtitled,
                    &timeline,
                    &request.audio_clips,
                    &temp.join(format!("audio_{token}.mp4")),
                )
                .await,
            &mut warnings,
        );

        tracing::info!(
            scene = %scene.id,
            output = %clip.path.display(),
            degraded = !warnings.is_empty(),
            "Scene composed"
        );
        Ok(SceneOutput {
            clip,
            timeline,
            warnings,
        })
    }

    /// Compose several scenes concurrently. Results keep the input order.
    pub async fn compose_scenes(
        &self,
        requests: Vec<SceneRequest>,
    ) -> Vec<StoryreelResult<SceneOutput>> {
        let count = requests.len();
        let mut tasks = tokio::task::JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let engine = self.clone();
            tasks.spawn(async move { (index, engine.compose_scene(&request).await) });
        }

        let mut slots: Vec<Option<StoryreelResult<SceneOutput>>> =
            (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Scene task aborted"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(StoryreelError::from(anyhow::anyhow!(
                        "scene task ended without a result"
                    )))
                })
            })
            .collect()
    }

    /// Join composed scenes into `output_dir/output_filename`.
    ///
    /// Without transitions, scenes of one size and audio layout are
    /// stream-copied. Transitions or mismatched scenes re-encode.
    pub async fn create_video_from_scenes(
        &self,
        clips: &[VideoClip],
        output_filename: &str,
        include_transitions: bool,
    ) -> StoryreelResult<VideoClip> {
        let mut output = self.config.output_dir.join(output_filename);
        if output.extension().is_none() {
            output.set_extension("mp4");
        }
        let strategy = if include_transitions {
            ConcatStrategy::Reencode {
                transition: Transition::Cut,
            }
        } else {
            ConcatStrategy::StreamCopy
        };

        SceneConcatenator::new(self.renderer.clone(), self.config.fps)
            .concatenate(clips, strategy, &output, &self.config.temp_dir)
            .await
    }

    /// Export `clip` to every profile in the output directory.
    pub async fn export_video(
        &self,
        clip: &VideoClip,
        profiles: &[ExportProfile],
    ) -> StoryreelResult<ExportReport> {
        self.export_video_to(clip, profiles, &self.config.output_dir)
            .await
    }

    pub async fn export_video_to(
        &self,
        clip: &VideoClip,
        profiles: &[ExportProfile],
        dir: &Path,
    ) -> StoryreelResult<ExportReport> {
        Exporter::new(self.renderer.clone())
            .export(clip, profiles, dir)
            .await
    }

    /// Burn title and credits cards next to `clip` as `ui_<stem>.mp4`.
    pub async fn add_title_cards(&self, clip: &VideoClip, cards: &TitleCards) -> BestEffort {
        let output = clip.path.with_file_name(format!("ui_{}.mp4", clip.stem()));
        TitleCardRenderer::new(self.renderer.clone(), self.config.font_file.clone())
            .render(clip, cards, &output)
            .await
    }

    /// Delete temp files last modified more than `keep_recent` ago.
    /// Returns how many were removed.
    pub fn cleanup_temp_files(&self, keep_recent: Duration) -> StoryreelResult<usize> {
        let dir = &self.config.temp_dir;
        if !dir.exists() {
            return Ok(0);
        }
        let Some(cutoff) = SystemTime::now().checked_sub(keep_recent) else {
            return Ok(0);
        };

        let mut removed = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let modified = match entry.metadata().and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot stat temp file");
                    continue;
                }
            };

            if modified < cutoff {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to remove temp file"
                        )
                    }
                }
            }
        }

        tracing::info!(removed, dir = %dir.display(), "Cleaned up temp files");
        Ok(removed)
    }
}

/// Take a best-effort stage's clip, recording a warning if it degraded.
fn settle(outcome: BestEffort, warnings: &mut Vec<StageWarning>) -> VideoClip {
    match outcome {
        Ok(clip) => clip,
        Err(degraded) => {
            warnings.push(degraded.warning());
            degraded.into_clip()
        }
    }
}
