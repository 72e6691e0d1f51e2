//! Layer compositor: background plus character layers into one visual stream.
//!
//! The compositor resolves a scene's layers into a z-ordered [`LayerStack`]
//! and renders it with a single renderer invocation. Layers are painted
//! bottom-up, each overlay consuming the previous overlay's output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_common::clock::FrameClock;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_scene_model::clip::VideoClip;
use storyreel_scene_model::layer::{CompositionLayer, LayerStack, PixelPosition};
use storyreel_scene_model::scene::Scene;
use storyreel_scene_model::timeline::TimeWindow;

use crate::graph::{
    AudioEncode, EncodeSettings, FilterOp, RenderInput, RenderRequest, StreamMap, StreamRef,
};
use crate::renderer::Renderer;

/// Renders a [`LayerStack`] to a silent video at the target resolution.
pub struct LayerCompositor {
    renderer: Arc<dyn Renderer>,
    width: u32,
    height: u32,
    clock: FrameClock,
}

impl LayerCompositor {
    pub fn new(renderer: Arc<dyn Renderer>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            renderer,
            width,
            height,
            clock: FrameClock::new(fps),
        }
    }

    /// Resolve the scene's layers.
    ///
    /// A missing background is fatal. Character clips that do not exist on
    /// disk are left out of the stack.
    pub fn build_stack(
        &self,
        scene: &Scene,
        background: &Path,
        character_clips: &BTreeMap<String, PathBuf>,
        duration_secs: f64,
    ) -> StoryreelResult<LayerStack> {
        if !background.is_file() {
            return Err(StoryreelError::missing_asset(background));
        }

        let mut characters = Vec::with_capacity(character_clips.len());
        for (name, clip) in character_clips {
            if !clip.is_file() {
                tracing::debug!(
                    scene = %scene.id,
                    character = %name,
                    path = %clip.display(),
                    "Character clip missing, omitting layer"
                );
                continue;
            }
            let slot = scene.character_position(name);
            let position = PixelPosition::for_slot(slot, self.width, self.height);
            characters.push(CompositionLayer::character(clip, position, duration_secs));
        }

        LayerStack::new(
            CompositionLayer::background(background, duration_secs),
            characters,
            duration_secs,
        )
    }

    /// Describe the render for a layer stack.
    pub fn plan(&self, stack: &LayerStack, output: &Path) -> RenderRequest {
        let duration = stack.duration_secs();
        let mut request = RenderRequest::new("composite", output);

        let bg = request.add_input(RenderInput::visual(stack.background().source()));
        request.push_filter(FilterOp::Scale {
            input: StreamRef::video(bg),
            width: self.width,
            height: self.height,
            output: "bg".to_string(),
        });

        let mut current = "bg".to_string();
        for (i, layer) in stack.overlays().iter().enumerate() {
            let index = request.add_input(RenderInput::visual(layer.source()));
            let mut top = StreamRef::video(index);

            if (layer.scale - 1.0).abs() > f64::EPSILON {
                let label = format!("s{i}");
                request.push_filter(FilterOp::ScaleBy {
                    input: top,
                    factor: layer.scale,
                    output: label.clone(),
                });
                top = StreamRef::label(label);
            }
            if layer.opacity < 1.0 {
                let label = format!("o{i}");
                request.push_filter(FilterOp::Opacity {
                    input: top,
                    opacity: layer.opacity,
                    output: label.clone(),
                });
                top = StreamRef::label(label);
            }

            let window = (!layer.spans(duration))
                .then(|| TimeWindow::new(layer.start_secs, layer.end_secs(duration)));
            let label = format!("v{i}");
            request.push_filter(FilterOp::Overlay {
                base: StreamRef::label(current),
                top,
                x: layer.position.x,
                y: layer.position.y,
                window,
                output: label.clone(),
            });
            current = label;
        }

        request.map(StreamMap::required(StreamRef::label(current)));
        request.encode = EncodeSettings::INTERMEDIATE.with_audio(AudioEncode::None);
        request.duration_secs = Some(duration);
        request.frame_rate = Some(self.clock.fps());
        request
    }

    /// How far `probed` is off `expected`, when that is more than one frame.
    pub fn duration_drift(&self, probed: f64, expected: f64) -> Option<f64> {
        (!self.clock.within_one_frame(probed, expected)).then(|| (probed - expected).abs())
    }

    /// Render the stack to `output`.
    ///
    /// The output is probed afterwards; drift beyond one frame is logged and
    /// the clip keeps the timeline duration.
    pub async fn compose(&self, stack: &LayerStack, output: &Path) -> StoryreelResult<VideoClip> {
        let request = self.plan(stack, output);
        tracing::info!(
            layers = stack.layers().len(),
            duration_secs = stack.duration_secs(),
            output = %output.display(),
            "Compositing layers"
        );

        let result = self.renderer.render(&request).await?;
        if !result.succeeded() {
            return Err(StoryreelError::composition(format!(
                "Layer composite failed ({})",
                result.failure_summary()
            )));
        }

        if let Some(probed) = self
            .renderer
            .probe(output)
            .await
            .and_then(|probe| probe.duration_secs)
        {
            if let Some(drift) = self.duration_drift(probed, stack.duration_secs()) {
                tracing::warn!(
                    expected_secs = stack.duration_secs(),
                    probed_secs = probed,
                    drift_secs = drift,
                    output = %output.display(),
                    "Composited duration drifts from timeline by more than one frame"
                );
            }
        }

        Ok(VideoClip::new(
            output,
            stack.duration_secs(),
            self.width,
            self.height,
        ))
    }
}
