//! Storyreel Render Engine
//!
//! Assembles independently produced media into finished scenes, joins
//! scenes into one video, and exports that video to several profiles.
//!
//! # Pipeline Architecture
//!
//! ```text
//! dialogue lines ──► Timeline ─────────────┬──────────────────┐
//!                                          │                  │
//! background.png ──┐                       ▼                  ▼
//!                  ├── LayerCompositor ─► DialogueOverlay ─► AudioMixer ─► scene.mp4
//! character clips ─┘                                          ▲
//!                                                             │
//! dialogue audio ─────────────────────────────────────────────┘
//!
//! scene_1.mp4 ┐
//! scene_2.mp4 ├── SceneConcatenator ─► final.mp4 ─► Exporter ─► final_high.mp4
//! scene_n.mp4 ┘                                              ─► final_low.webm
//! ```
//!
//! Every stage describes its work as a [`graph::RenderRequest`] and hands
//! it to a [`renderer::Renderer`]. [`ffmpeg::FfmpegRenderer`] is the
//! production backend.

pub mod audio_mix;
pub mod cards;
pub mod compositor;
pub mod concat;
pub mod engine;
pub mod export;
pub mod ffmpeg;
pub mod graph;
pub mod overlay;
pub mod renderer;
pub mod stage;

pub use cards::TitleCards;
pub use concat::{ConcatStrategy, Transition};
pub use engine::{AssemblyEngine, SceneOutput, SceneRequest};
pub use export::ExportReport;
pub use ffmpeg::FfmpegRenderer;
pub use renderer::{MediaProbe, ProcessResult, Renderer, ThrottledRenderer};
pub use stage::{BestEffort, Degraded, Stage, StageWarning};
