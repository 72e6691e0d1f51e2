//! Audio timeline mixer.
//!
//! Each spoken line contributes its character's audio clip, delayed to the
//! line's start on the timeline. All delayed tracks, plus the video's own
//! audio when it has any, are mixed down to one stream.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_scene_model::clip::VideoClip;
use storyreel_scene_model::timeline::Timeline;

use crate::graph::{
    AudioEncode, EncodeSettings, FilterOp, RenderInput, RenderRequest, StreamMap, StreamRef,
    VideoEncode,
};
use crate::renderer::Renderer;
use crate::stage::{BestEffort, Degraded, Stage};

/// Bitrate of the mixed scene audio.
const MIX_AUDIO_BITRATE_KBPS: u32 = 192;

/// One line's audio, positioned on the scene timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedTrack {
    pub line_order: u32,
    pub character: String,
    pub path: PathBuf,
    pub delay_ms: u64,
}

/// Place a track for every spoken line whose character has an audio clip
/// on disk. Lines without one contribute silence.
pub fn plan_tracks(
    timeline: &Timeline,
    audio_clips: &BTreeMap<String, PathBuf>,
) -> Vec<DelayedTrack> {
    timeline
        .overlay_entries()
        .filter_map(|entry| {
            let character = entry.line.speaker()?;
            let path = audio_clips.get(character)?;
            if !path.is_file() {
                tracing::debug!(
                    character,
                    path = %path.display(),
                    "Audio clip missing, line stays silent"
                );
                return None;
            }
            Some(DelayedTrack {
                line_order: entry.line.order,
                character: character.to_string(),
                path: path.clone(),
                delay_ms: entry.delay_ms(),
            })
        })
        .collect()
}

pub struct AudioMixer {
    renderer: Arc<dyn Renderer>,
}

impl AudioMixer {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }

    /// Describe the mix. `include_base` keeps the video's own audio in the mix.
    pub fn plan(
        &self,
        input: &VideoClip,
        tracks: &[DelayedTrack],
        include_base: bool,
        duration_secs: f64,
        output: &Path,
    ) -> RenderRequest {
        let mut request = RenderRequest::new("audio_mix", output);
        let video = request.add_input(RenderInput::File(input.path.clone()));

        let mut mix_inputs = Vec::with_capacity(tracks.len() + 1);
        if include_base {
            mix_inputs.push(StreamRef::audio(video));
        }
        for (i, track) in tracks.iter().enumerate() {
            let index = request.add_input(RenderInput::File(track.path.clone()));
            let label = format!("d{i}");
            request.push_filter(FilterOp::Delay {
                input: StreamRef::audio(index),
                millis: track.delay_ms,
                output: label.clone(),
            });
            mix_inputs.push(StreamRef::label(label));
        }
        request.push_filter(FilterOp::Mix {
            inputs: mix_inputs,
            output: "aout".to_string(),
        });

        request.map(StreamMap::required(StreamRef::video(video)));
        request.map(StreamMap::required(StreamRef::label("aout")));
        request.encode = EncodeSettings {
            video: VideoEncode::Copy,
            audio: AudioEncode::Aac {
                bitrate_kbps: MIX_AUDIO_BITRATE_KBPS,
            },
        };
        request.duration_secs = Some(duration_secs);
        request
    }

    /// Dub `input` with the timeline's dialogue audio.
    ///
    /// With no playable tracks the input is returned as-is.
    pub async fn mix(
        &self,
        input: &VideoClip,
        timeline: &Timeline,
        audio_clips: &BTreeMap<String, PathBuf>,
        output: &Path,
    ) -> BestEffort {
        let tracks = plan_tracks(timeline, audio_clips);
        if tracks.is_empty() {
            tracing::debug!(input = %input.path.display(), "No dialogue audio to mix");
            return Ok(input.clone());
        }

        let include_base = self
            .renderer
            .probe(&input.path)
            .await
            .map(|probe| probe.has_audio)
            .unwrap_or(false);

        let request = self.plan(input, &tracks, include_base, timeline.total_duration(), output);
        tracing::info!(
            tracks = tracks.len(),
            base_audio = include_base,
            output = %output.display(),
            "Mixing dialogue audio"
        );

        let reason = match self.renderer.render(&request).await {
            Ok(result) if result.succeeded() => {
                return Ok(input.relocated(output).with_audio(output));
            }
            Ok(result) => result.failure_summary(),
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            stage = %Stage::AudioMix,
            input = %input.path.display(),
            reason = %reason,
            "Audio mix failed, keeping scene with original audio"
        );
        Err(Degraded::new(Stage::AudioMix, input, reason))
    }
}
