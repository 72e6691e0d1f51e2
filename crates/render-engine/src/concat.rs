//! Scene concatenation.
//!
//! Two strategies join composed scenes:
//! - [`ConcatStrategy::StreamCopy`] uses the concat demuxer with `-c copy`
//!   and never re-encodes. It requires scenes with the same resolution and
//!   the same audio layout; other lists fall back to a cut re-encode.
//! - [`ConcatStrategy::Reencode`] decodes every scene and joins them with the
//!   concat filter, passing through [`apply_transition`] at each seam.
//!   Scenes are scaled to the first scene's size and silent scenes get a
//!   generated silent track when any scene has audio.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_common::clock::{output_token, FrameClock};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_scene_model::clip::VideoClip;

use crate::graph::{
    AudioEncode, ConcatSegment, EncodeSettings, FilterOp, RenderInput, RenderRequest, StreamMap,
    StreamRef,
};
use crate::renderer::Renderer;

/// What happens between two consecutive scenes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transition {
    /// Hard cut.
    #[default]
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStrategy {
    StreamCopy,
    Reencode { transition: Transition },
}

/// Build the segment list for a re-encoding join.
///
/// Every transition between scenes goes through here.
pub fn apply_transition(
    segments: Vec<ConcatSegment>,
    transition: Transition,
) -> Vec<ConcatSegment> {
    match transition {
        Transition::Cut => segments,
    }
}

/// Contents of a concat demuxer manifest.
pub fn concat_manifest(paths: &[PathBuf]) -> String {
    let mut manifest = String::new();
    for path in paths {
        let escaped = path.to_string_lossy().replace('\'', r"'\''");
        manifest.push_str(&format!("file '{escaped}'\n"));
    }
    manifest
}

pub struct SceneConcatenator {
    renderer: Arc<dyn Renderer>,
    clock: FrameClock,
}

impl SceneConcatenator {
    pub fn new(renderer: Arc<dyn Renderer>, fps: u32) -> Self {
        Self {
            renderer,
            clock: FrameClock::new(fps),
        }
    }

    /// Join `clips` in order into `output`.
    ///
    /// The manifest for stream-copy joins is written to `work_dir` and
    /// removed afterwards.
    pub async fn concatenate(
        &self,
        clips: &[VideoClip],
        strategy: ConcatStrategy,
        output: &Path,
        work_dir: &Path,
    ) -> StoryreelResult<VideoClip> {
        let first = clips
            .first()
            .ok_or_else(|| StoryreelError::invalid_input("No scenes to concatenate"))?;
        if let Some(missing) = clips.iter().find(|clip| !clip.exists()) {
            return Err(StoryreelError::missing_asset(&missing.path));
        }

        let audio = self.audio_layout(clips).await;
        let strategy = match strategy {
            ConcatStrategy::StreamCopy if !stream_copy_compatible(clips, &audio) => {
                tracing::debug!(
                    scenes = clips.len(),
                    "Scenes differ in size or audio layout, re-encoding instead of stream copy"
                );
                ConcatStrategy::Reencode {
                    transition: Transition::Cut,
                }
            }
            other => other,
        };
        let with_audio = audio.iter().any(|has| *has);
        let duration_secs: f64 = clips.iter().map(|clip| clip.duration_secs).sum();
        tracing::info!(
            scenes = clips.len(),
            strategy = ?strategy,
            with_audio,
            duration_secs,
            output = %output.display(),
            "Concatenating scenes"
        );

        let mut manifest_path = None;
        let request = match strategy {
            ConcatStrategy::StreamCopy => {
                let paths = clips
                    .iter()
                    .map(|clip| absolute(&clip.path))
                    .collect::<StoryreelResult<Vec<_>>>()?;
                std::fs::create_dir_all(work_dir)?;
                let manifest = work_dir.join(format!(
                    "{}.concat.txt",
                    output_token(&["concat", &stem_of(output)])
                ));
                std::fs::write(&manifest, concat_manifest(&paths))?;
                manifest_path = Some(manifest.clone());
                self.plan_stream_copy(&manifest, output)
            }
            ConcatStrategy::Reencode { transition } => {
                self.plan_reencode(clips, &audio, transition, output)
            }
        };

        let outcome = self.renderer.render(&request).await;
        if let Some(manifest) = manifest_path {
            if let Err(e) = std::fs::remove_file(&manifest) {
                tracing::debug!(
                    path = %manifest.display(),
                    error = %e,
                    "Failed to remove concat manifest"
                );
            }
        }

        let result = outcome?;
        if !result.succeeded() {
            return Err(StoryreelError::concatenation(format!(
                "Joining {} scenes failed ({})",
                clips.len(),
                result.failure_summary()
            )));
        }

        let mut combined = VideoClip::new(output, duration_secs, first.width, first.height);
        if with_audio {
            combined = combined.with_audio(output);
        }
        Ok(combined)
    }

    pub fn plan_stream_copy(&self, manifest: &Path, output: &Path) -> RenderRequest {
        let mut request = RenderRequest::new("concat", output);
        request.add_input(RenderInput::ConcatManifest(manifest.to_path_buf()));
        request.encode = EncodeSettings::STREAM_COPY;
        request
    }

    /// Plan a concat-filter join. `audio[i]` says whether clip `i` carries
    /// an audio stream.
    pub fn plan_reencode(
        &self,
        clips: &[VideoClip],
        audio: &[bool],
        transition: Transition,
        output: &Path,
    ) -> RenderRequest {
        let mut request = RenderRequest::new("concat", output);
        let with_audio = audio.iter().any(|has| *has);
        let (width, height) = clips
            .first()
            .map(|clip| (clip.width, clip.height))
            .unwrap_or_default();

        let mut segments = Vec::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            let index = request.add_input(RenderInput::File(clip.path.clone()));

            let video = if (clip.width, clip.height) == (width, height) {
                StreamRef::video(index)
            } else {
                let label = format!("s{i}");
                request.push_filter(FilterOp::Scale {
                    input: StreamRef::video(index),
                    width,
                    height,
                    output: label.clone(),
                });
                StreamRef::label(label)
            };

            let segment_audio = match (with_audio, audio.get(i).copied().unwrap_or(false)) {
                (false, _) => None,
                (true, true) => Some(StreamRef::audio(index)),
                (true, false) => {
                    let label = format!("q{i}");
                    request.push_filter(FilterOp::Silence {
                        duration_secs: clip.duration_secs,
                        output: label.clone(),
                    });
                    Some(StreamRef::label(label))
                }
            };
            segments.push(ConcatSegment {
                video,
                audio: segment_audio,
            });
        }

        request.push_filter(FilterOp::Concat {
            segments: apply_transition(segments, transition),
            video_output: "vout".to_string(),
            audio_output: with_audio.then(|| "aout".to_string()),
        });
        request.map(StreamMap::required(StreamRef::label("vout")));
        request.encode = if with_audio {
            request.map(StreamMap::required(StreamRef::label("aout")));
            EncodeSettings::INTERMEDIATE.with_audio(AudioEncode::Aac { bitrate_kbps: 192 })
        } else {
            EncodeSettings::INTERMEDIATE.with_audio(AudioEncode::None)
        };
        request.frame_rate = Some(self.clock.fps());
        request
    }

    /// Whether each clip carries audio, from its recorded track or a probe.
    async fn audio_layout(&self, clips: &[VideoClip]) -> Vec<bool> {
        let mut layout = Vec::with_capacity(clips.len());
        for clip in clips {
            let has_audio = match clip.audio_path {
                Some(_) => true,
                None => self
                    .renderer
                    .probe(&clip.path)
                    .await
                    .map(|probe| probe.has_audio)
                    .unwrap_or(false),
            };
            layout.push(has_audio);
        }
        layout
    }
}

/// Stream copy needs one resolution and either audio on every clip or on none.
pub fn stream_copy_compatible(clips: &[VideoClip], audio: &[bool]) -> bool {
    let same_size = clips
        .windows(2)
        .all(|pair| (pair[0].width, pair[0].height) == (pair[1].width, pair[1].height));
    let same_audio = audio.windows(2).all(|pair| pair[0] == pair[1]);
    same_size && same_audio
}

fn absolute(path: &Path) -> StoryreelResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_quotes_paths() {
        let manifest = concat_manifest(&[
            PathBuf::from("/tmp/scene_1.mp4"),
            PathBuf::from("/tmp/bob's scene.mp4"),
        ]);
        assert_eq!(
            manifest,
            "file '/tmp/scene_1.mp4'\nfile '/tmp/bob'\\''s scene.mp4'\n"
        );
        assert_eq!(concat_manifest(&[]), "");
    }

    #[test]
    fn test_cut_keeps_segments() {
        let segments = vec![
            ConcatSegment {
                video: StreamRef::video(0),
                audio: None,
            },
            ConcatSegment {
                video: StreamRef::video(1),
                audio: None,
            },
        ];
        assert_eq!(apply_transition(segments.clone(), Transition::Cut), segments);
    }

    #[test]
    fn test_stream_copy_compatibility() {
        let hd = VideoClip::new("/tmp/a.mp4", 1.0, 1920, 1080);
        let small = VideoClip::new("/tmp/b.mp4", 1.0, 1280, 720);

        assert!(stream_copy_compatible(&[hd.clone(), hd.clone()], &[true, true]));
        assert!(stream_copy_compatible(&[hd.clone(), hd.clone()], &[false, false]));
        assert!(!stream_copy_compatible(&[hd.clone(), hd.clone()], &[true, false]));
        assert!(!stream_copy_compatible(&[hd.clone(), small], &[false, false]));
        assert!(stream_copy_compatible(&[hd], &[true]));
    }
}
