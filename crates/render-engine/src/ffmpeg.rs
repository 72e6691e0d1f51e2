//! FFmpeg render backend.
//!
//! Translates [`RenderRequest`]s into an ffmpeg argument vector and runs it
//! as a child process. The child is killed if the awaiting task is dropped,
//! and a partially written output file is removed on any failure.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use storyreel_common::config::AssemblyConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_scene_model::timeline::TimeWindow;

use crate::graph::{
    AudioEncode, FilterOp, RenderInput, RenderRequest, StreamKind, StreamMap, StreamRef, TextX,
    VideoEncode,
};
use crate::renderer::{MediaProbe, ProcessResult, Renderer};

/// Renders through the `ffmpeg` binary and probes with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegRenderer {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &AssemblyConfig) -> Self {
        Self::new(&config.ffmpeg_binary, &config.ffprobe_binary)
    }

    pub fn ffmpeg_binary(&self) -> &str {
        &self.ffmpeg
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, request: &RenderRequest) -> StoryreelResult<ProcessResult> {
        request.validate_graph().map_err(|e| {
            StoryreelError::renderer(format!("Malformed {} request: {e}", request.purpose))
        })?;

        if let Some(parent) = request.output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let args = build_args(request);
        tracing::debug!(
            purpose = request.purpose,
            args = %args.join(" "),
            "Invoking ffmpeg"
        );

        let result = run_process(&self.ffmpeg, &args, &request.output).await?;
        if result.succeeded() {
            tracing::info!(
                purpose = request.purpose,
                output = %request.output.display(),
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Render finished"
            );
        } else {
            tracing::warn!(
                purpose = request.purpose,
                output = %request.output.display(),
                exit_code = ?result.exit_code,
                "Render failed"
            );
        }
        Ok(result)
    }

    async fn probe(&self, path: &Path) -> Option<MediaProbe> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,width,height",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            tracing::debug!(path = %path.display(), "ffprobe could not read file");
            return None;
        }
        parse_probe_json(&String::from_utf8_lossy(&output.stdout))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Full argument vector for one request, excluding the program name.
pub fn build_args(request: &RenderRequest) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in &request.inputs {
        match input {
            RenderInput::File(_) => {}
            RenderInput::LoopedImage(_) => {
                args.push("-loop".to_string());
                args.push("1".to_string());
            }
            RenderInput::ConcatManifest(_) => {
                args.extend(["-f", "concat", "-safe", "0"].map(String::from));
            }
        }
        args.push("-i".to_string());
        args.push(input.path().to_string_lossy().into_owned());
    }

    if !request.filters.is_empty() {
        args.push("-filter_complex".to_string());
        args.push(filter_graph(&request.filters));
    }

    for map in &request.maps {
        args.push("-map".to_string());
        args.push(map_arg(map));
    }

    args.extend(codec_args(request));

    if let Some(duration) = request.duration_secs {
        args.push("-t".to_string());
        args.push(format!("{duration:.6}"));
    }
    if let Some(fps) = request.frame_rate {
        args.push("-r".to_string());
        args.push(fps.to_string());
    }

    args.push(request.output.to_string_lossy().into_owned());
    args
}

fn codec_args(request: &RenderRequest) -> Vec<String> {
    let mut args = Vec::new();
    match request.encode.video {
        VideoEncode::Copy => args.extend(["-c:v", "copy"].map(String::from)),
        VideoEncode::H264 { crf, preset } => {
            args.extend(["-c:v", "libx264", "-preset", preset.as_str()].map(String::from));
            args.push("-crf".to_string());
            args.push(crf.to_string());
            args.extend(["-pix_fmt", "yuv420p"].map(String::from));
        }
        VideoEncode::Vp9 { crf } => {
            args.extend(["-c:v", "libvpx-vp9", "-crf"].map(String::from));
            args.push(crf.to_string());
            args.extend(["-b:v", "0"].map(String::from));
        }
    }

    match request.encode.audio {
        AudioEncode::Copy => args.extend(["-c:a", "copy"].map(String::from)),
        AudioEncode::Aac { bitrate_kbps } => {
            args.extend(["-c:a", "aac", "-b:a"].map(String::from));
            args.push(format!("{bitrate_kbps}k"));
        }
        AudioEncode::Opus { bitrate_kbps } => {
            args.extend(["-c:a", "libopus", "-b:a"].map(String::from));
            args.push(format!("{bitrate_kbps}k"));
        }
        AudioEncode::None => args.push("-an".to_string()),
    }

    let progressive_container = request
        .output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp4") || e.eq_ignore_ascii_case("mov"))
        .unwrap_or(false);
    if progressive_container && request.encode.video != VideoEncode::Copy {
        args.extend(["-movflags", "+faststart"].map(String::from));
    }
    args
}

fn map_arg(map: &StreamMap) -> String {
    let base = match &map.stream {
        StreamRef::Input { index, kind } => format!("{index}:{}", kind_suffix(*kind)),
        StreamRef::Label(label) => format!("[{label}]"),
    };
    if map.optional && matches!(map.stream, StreamRef::Input { .. }) {
        format!("{base}?")
    } else {
        base
    }
}

fn kind_suffix(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Video => "v",
        StreamKind::Audio => "a",
    }
}

fn pad(stream: &StreamRef) -> String {
    match stream {
        StreamRef::Input { index, kind } => format!("[{index}:{}]", kind_suffix(*kind)),
        StreamRef::Label(label) => format!("[{label}]"),
    }
}

fn enable_expr(window: &TimeWindow) -> String {
    format!(
        ":enable='gte(t,{:.6})*lt(t,{:.6})'",
        window.start_secs, window.end_secs
    )
}

const SILENCE_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=48000";

/// Render the typed filter list as one `-filter_complex` graph.
pub fn filter_graph(filters: &[FilterOp]) -> String {
    filters
        .iter()
        .map(filter_chain)
        .collect::<Vec<_>>()
        .join(";")
}

fn filter_chain(op: &FilterOp) -> String {
    match op {
        FilterOp::Scale {
            input,
            width,
            height,
            output,
        } => format!("{}scale={width}:{height}[{output}]", pad(input)),
        FilterOp::ScaleBy {
            input,
            factor,
            output,
        } => format!(
            "{}scale=iw*{factor:.4}:ih*{factor:.4}[{output}]",
            pad(input)
        ),
        FilterOp::Opacity {
            input,
            opacity,
            output,
        } => format!(
            "{}format=rgba,colorchannelmixer=aa={opacity:.4}[{output}]",
            pad(input)
        ),
        FilterOp::Overlay {
            base,
            top,
            x,
            y,
            window,
            output,
        } => {
            let enable = window.as_ref().map(enable_expr).unwrap_or_default();
            format!("{}{}overlay={x}:{y}{enable}[{output}]", pad(base), pad(top))
        }
        FilterOp::DrawBox {
            input,
            x,
            y,
            width,
            height,
            color,
            alpha,
            output,
        } => format!(
            "{}drawbox=x={x}:y={y}:w={width}:h={height}:color={color}@{alpha:.2}:t=fill[{output}]",
            pad(input)
        ),
        FilterOp::DrawText {
            input,
            text,
            x,
            y,
            font_size,
            color,
            font_file,
            window,
            output,
        } => {
            let x = match x {
                TextX::Fixed(px) => px.to_string(),
                TextX::Centered => "(w-text_w)/2".to_string(),
            };
            let mut filter = format!(
                "{}drawtext=expansion=none:text={}:fontsize={font_size}:fontcolor={color}:x={x}:y={y}",
                pad(input),
                escape_filter_text(text)
            );
            if let Some(font) = font_file {
                filter.push_str(":fontfile=");
                filter.push_str(&escape_filter_text(&font.to_string_lossy()));
            }
            if let Some(window) = window {
                filter.push_str(&enable_expr(window));
            }
            filter.push_str(&format!("[{output}]"));
            filter
        }
        FilterOp::Delay {
            input,
            millis,
            output,
        } => format!("{}adelay={millis}|{millis}[{output}]", pad(input)),
        FilterOp::Silence {
            duration_secs,
            output,
        } => format!("{SILENCE_SOURCE},atrim=duration={duration_secs:.6}[{output}]"),
        FilterOp::Mix { inputs, output } => {
            let pads: String = inputs.iter().map(pad).collect();
            format!(
                "{pads}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[{output}]",
                inputs.len()
            )
        }
        FilterOp::Concat {
            segments,
            video_output,
            audio_output,
        } => {
            let mut pads = String::new();
            for segment in segments {
                pads.push_str(&pad(&segment.video));
                if audio_output.is_some() {
                    if let Some(audio) = &segment.audio {
                        pads.push_str(&pad(audio));
                    }
                }
            }
            let audio_streams = usize::from(audio_output.is_some());
            let mut filter = format!(
                "{pads}concat=n={}:v=1:a={audio_streams}[{video_output}]",
                segments.len()
            );
            if let Some(audio) = audio_output {
                filter.push_str(&format!("[{audio}]"));
            }
            filter
        }
    }
}

/// Escape arbitrary text for use as a filter option value inside a
/// `-filter_complex` graph.
///
/// Two levels apply: the option value level (`\ ' :`) and then the graph
/// level (`\ ' [ ] , ;`).
pub fn escape_filter_text(text: &str) -> String {
    let mut value = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            value.push('\\');
        }
        value.push(c);
    }

    let mut escaped = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Removes the output file on drop unless disarmed.
struct PartialOutputGuard {
    path: Option<PathBuf>,
}

impl PartialOutputGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for PartialOutputGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if path.exists() {
                match std::fs::remove_file(&path) {
                    Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove partial output"
                    ),
                }
            }
        }
    }
}

/// Run a render process to completion.
///
/// Dropping the returned future kills the child and deletes `output`.
pub async fn run_process(
    program: &str,
    args: &[String],
    output: &Path,
) -> StoryreelResult<ProcessResult> {
    let started = Instant::now();
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StoryreelError::renderer(format!("Failed to start {program}: {e}")))?;

    let mut guard = PartialOutputGuard::new(output);
    let finished = child
        .wait_with_output()
        .await
        .map_err(|e| StoryreelError::renderer(format!("Failed waiting for {program}: {e}")))?;

    let success = finished.status.success();
    if success && output.is_file() {
        guard.disarm();
    }
    drop(guard);

    Ok(ProcessResult {
        success,
        exit_code: finished.status.code(),
        stderr: String::from_utf8_lossy(&finished.stderr).into_owned(),
        output_exists: output.is_file(),
        elapsed: started.elapsed(),
    })
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output into a [`MediaProbe`].
pub fn parse_probe_json(raw: &str) -> Option<MediaProbe> {
    let parsed: ProbeOutput = serde_json::from_str(raw).ok()?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Some(MediaProbe {
        duration_secs: parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0),
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        has_video: video.is_some(),
        has_audio,
    })
}

/// Whether `binary` resolves on PATH, or exists when given as a path.
pub fn command_exists(binary: &str) -> bool {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
