//! Structured render requests.
//!
//! Stages never build command strings. They describe their work as a
//! [`RenderRequest`]: typed inputs, an ordered list of [`FilterOp`]s wired
//! together by stream labels, output stream selection, and encode settings.
//! A [`crate::renderer::Renderer`] backend translates that description into
//! its own command syntax.

use std::path::{Path, PathBuf};

use storyreel_scene_model::profile::{AudioCodec, EncodeParams, EncoderPreset, VideoCodec};
use storyreel_scene_model::timeline::TimeWindow;

/// Extensions treated as still images that must be looped to span a scene.
const STILL_IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "bmp", "gif"];

/// A media input to a render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderInput {
    /// A video or audio file read as-is.
    File(PathBuf),
    /// A still image repeated for the output duration.
    LoopedImage(PathBuf),
    /// A manifest listing files to join without re-encoding.
    ConcatManifest(PathBuf),
}

impl RenderInput {
    /// Pick the input kind for a visual source: stills loop, everything else
    /// is read as a file.
    pub fn visual(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_still_image(&path) {
            Self::LoopedImage(path)
        } else {
            Self::File(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::LoopedImage(p) | Self::ConcatManifest(p) => p,
        }
    }
}

/// Whether the file extension names a still image format.
pub fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            STILL_IMAGE_EXTENSIONS
                .iter()
                .any(|still| still.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// A stream consumed or produced by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRef {
    /// The first stream of the given kind in input `index`.
    Input { index: usize, kind: StreamKind },
    /// The output of an earlier filter.
    Label(String),
}

impl StreamRef {
    pub fn video(index: usize) -> Self {
        Self::Input {
            index,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        Self::Input {
            index,
            kind: StreamKind::Audio,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self::Label(name.into())
    }
}

/// Horizontal text placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextX {
    Fixed(i32),
    Centered,
}

/// One join point between concatenated segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatSegment {
    pub video: StreamRef,
    pub audio: Option<StreamRef>,
}

/// A single typed filter operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Resize to exact dimensions.
    Scale {
        input: StreamRef,
        width: u32,
        height: u32,
        output: String,
    },
    /// Resize by a uniform factor.
    ScaleBy {
        input: StreamRef,
        factor: f64,
        output: String,
    },
    /// Multiply the alpha channel.
    Opacity {
        input: StreamRef,
        opacity: f64,
        output: String,
    },
    /// Paint `top` over `base` at a pixel offset.
    Overlay {
        base: StreamRef,
        top: StreamRef,
        x: i32,
        y: i32,
        window: Option<TimeWindow>,
        output: String,
    },
    /// Filled rectangle.
    DrawBox {
        input: StreamRef,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: String,
        alpha: f64,
        output: String,
    },
    /// Burned-in text.
    DrawText {
        input: StreamRef,
        text: String,
        x: TextX,
        y: i32,
        font_size: u32,
        color: String,
        font_file: Option<PathBuf>,
        window: Option<TimeWindow>,
        output: String,
    },
    /// Shift an audio stream later in time.
    Delay {
        input: StreamRef,
        millis: u64,
        output: String,
    },
    /// Generated silent stereo audio of a fixed length.
    Silence {
        duration_secs: f64,
        output: String,
    },
    /// N-to-1 audio mix.
    Mix {
        inputs: Vec<StreamRef>,
        output: String,
    },
    /// Join segments end to end.
    Concat {
        segments: Vec<ConcatSegment>,
        video_output: String,
        audio_output: Option<String>,
    },
}

impl FilterOp {
    /// Labels this operation produces.
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Self::Scale { output, .. }
            | Self::ScaleBy { output, .. }
            | Self::Opacity { output, .. }
            | Self::Overlay { output, .. }
            | Self::DrawBox { output, .. }
            | Self::DrawText { output, .. }
            | Self::Delay { output, .. }
            | Self::Silence { output, .. }
            | Self::Mix { output, .. } => vec![output.as_str()],
            Self::Concat {
                video_output,
                audio_output,
                ..
            } => {
                let mut labels = vec![video_output.as_str()];
                if let Some(audio) = audio_output {
                    labels.push(audio.as_str());
                }
                labels
            }
        }
    }
}

/// A stream routed to the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMap {
    pub stream: StreamRef,
    /// Missing optional streams are skipped instead of failing the render.
    pub optional: bool,
}

impl StreamMap {
    pub fn required(stream: StreamRef) -> Self {
        Self {
            stream,
            optional: false,
        }
    }

    pub fn optional(stream: StreamRef) -> Self {
        Self {
            stream,
            optional: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncode {
    Copy,
    H264 { crf: u8, preset: EncoderPreset },
    Vp9 { crf: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncode {
    Copy,
    Aac { bitrate_kbps: u32 },
    Opus { bitrate_kbps: u32 },
    /// Drop audio entirely.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub video: VideoEncode,
    pub audio: AudioEncode,
}

impl EncodeSettings {
    /// Settings for intermediate scene files.
    pub const INTERMEDIATE: EncodeSettings = EncodeSettings {
        video: VideoEncode::H264 {
            crf: 18,
            preset: EncoderPreset::Medium,
        },
        audio: AudioEncode::Copy,
    };

    /// Remux without touching any stream.
    pub const STREAM_COPY: EncodeSettings = EncodeSettings {
        video: VideoEncode::Copy,
        audio: AudioEncode::Copy,
    };

    pub fn with_audio(mut self, audio: AudioEncode) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_video(mut self, video: VideoEncode) -> Self {
        self.video = video;
        self
    }
}

impl From<EncodeParams> for EncodeSettings {
    fn from(params: EncodeParams) -> Self {
        let video = match params.video_codec {
            VideoCodec::H264 => VideoEncode::H264 {
                crf: params.crf,
                preset: params.preset,
            },
            VideoCodec::Vp9 => VideoEncode::Vp9 { crf: params.crf },
        };
        let audio = match params.audio_codec {
            AudioCodec::Aac => AudioEncode::Aac {
                bitrate_kbps: params.audio_bitrate_kbps,
            },
            AudioCodec::Opus => AudioEncode::Opus {
                bitrate_kbps: params.audio_bitrate_kbps,
            },
        };
        Self { video, audio }
    }
}

/// Everything a backend needs to produce one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Short purpose tag used in logs (e.g. "composite", "export").
    pub purpose: &'static str,
    pub inputs: Vec<RenderInput>,
    pub filters: Vec<FilterOp>,
    pub maps: Vec<StreamMap>,
    pub encode: EncodeSettings,
    /// Trim the output to this many seconds.
    pub duration_secs: Option<f64>,
    /// Force the output frame rate.
    pub frame_rate: Option<u32>,
    pub output: PathBuf,
}

impl RenderRequest {
    pub fn new(purpose: &'static str, output: impl Into<PathBuf>) -> Self {
        Self {
            purpose,
            inputs: Vec::new(),
            filters: Vec::new(),
            maps: Vec::new(),
            encode: EncodeSettings::INTERMEDIATE,
            duration_secs: None,
            frame_rate: None,
            output: output.into(),
        }
    }

    /// Append an input and return its index.
    pub fn add_input(&mut self, input: RenderInput) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    pub fn push_filter(&mut self, op: FilterOp) {
        self.filters.push(op);
    }

    pub fn map(&mut self, map: StreamMap) {
        self.maps.push(map);
    }

    /// Filters of a given shape, for inspection in tests and logs.
    pub fn draw_texts(&self) -> impl Iterator<Item = (&str, Option<&TimeWindow>)> {
        self.filters.iter().filter_map(|op| match op {
            FilterOp::DrawText { text, window, .. } => Some((text.as_str(), window.as_ref())),
            _ => None,
        })
    }

    /// Check that every label is produced before it is consumed and that
    /// every input reference points at a declared input.
    pub fn validate_graph(&self) -> Result<(), String> {
        let mut produced: Vec<&str> = Vec::new();
        let check = |stream: &StreamRef, produced: &[&str]| -> Result<(), String> {
            match stream {
                StreamRef::Input { index, .. } if *index >= self.inputs.len() => {
                    Err(format!("input {index} is not declared"))
                }
                StreamRef::Label(label) if !produced.contains(&label.as_str()) => {
                    Err(format!("label [{label}] is used before it is produced"))
                }
                _ => Ok(()),
            }
        };

        for op in &self.filters {
            for stream in op_inputs(op) {
                check(stream, &produced)?;
            }
            for label in op.outputs() {
                if produced.contains(&label) {
                    return Err(format!("label [{label}] is produced twice"));
                }
                produced.push(label);
            }
        }
        for map in &self.maps {
            check(&map.stream, &produced)?;
        }
        Ok(())
    }
}

fn op_inputs(op: &FilterOp) -> Vec<&StreamRef> {
    match op {
        FilterOp::Scale { input, .. }
        | FilterOp::ScaleBy { input, .. }
        | FilterOp::Opacity { input, .. }
        | FilterOp::DrawBox { input, .. }
        | FilterOp::DrawText { input, .. }
        | FilterOp::Delay { input, .. } => vec![input],
        FilterOp::Overlay { base, top, .. } => vec![base, top],
        FilterOp::Mix { inputs, .. } => inputs.iter().collect(),
        FilterOp::Silence { .. } => Vec::new(),
        FilterOp::Concat { segments, .. } => segments
            .iter()
            .flat_map(|s| std::iter::once(&s.video).chain(s.audio.as_ref()))
            .collect(),
    }
}
