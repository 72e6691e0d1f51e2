//! Dialogue overlay: burns subtitles and speaker labels into a scene.
//!
//! The overlay is best-effort. A failed render hands back the input clip
//! as [`Degraded`] instead of failing the scene.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_scene_model::clip::VideoClip;
use storyreel_scene_model::layer::{scale_axis, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use storyreel_scene_model::timeline::Timeline;

use crate::graph::{
    EncodeSettings, FilterOp, RenderInput, RenderRequest, StreamMap, StreamRef, TextX,
};
use crate::renderer::Renderer;
use crate::stage::{BestEffort, Degraded, Stage};

/// Dialogue box and text geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueStyle {
    pub box_x: i32,
    pub box_y: i32,
    pub box_width: u32,
    pub box_height: u32,
    pub box_color: String,
    pub box_alpha: f64,
    pub name_x: i32,
    pub name_y: i32,
    pub name_size: u32,
    pub name_color: String,
    pub text_x: i32,
    pub text_y: i32,
    /// Narration has no name label, so its text sits higher.
    pub narration_y: i32,
    pub text_size: u32,
    pub text_color: String,
}

impl Default for DialogueStyle {
    /// Geometry at the 1920x1080 reference frame.
    fn default() -> Self {
        Self {
            box_x: 160,
            box_y: 680,
            box_width: 1600,
            box_height: 300,
            box_color: "black".to_string(),
            box_alpha: 0.8,
            name_x: 200,
            name_y: 700,
            name_size: 32,
            name_color: "yellow".to_string(),
            text_x: 200,
            text_y: 750,
            narration_y: 725,
            text_size: 28,
            text_color: "white".to_string(),
        }
    }
}

impl DialogueStyle {
    /// Scale reference geometry to a target frame size.
    pub fn scaled(&self, width: u32, height: u32) -> Self {
        let x = |v: i32| scale_axis(v, width, REFERENCE_WIDTH);
        let y = |v: i32| scale_axis(v, height, REFERENCE_HEIGHT);
        let size = |v: u32| y(v as i32).max(1) as u32;
        Self {
            box_x: x(self.box_x),
            box_y: y(self.box_y),
            box_width: x(self.box_width as i32).max(1) as u32,
            box_height: size(self.box_height),
            name_x: x(self.name_x),
            name_y: y(self.name_y),
            name_size: size(self.name_size),
            text_x: x(self.text_x),
            text_y: y(self.text_y),
            narration_y: y(self.narration_y),
            text_size: size(self.text_size),
            ..self.clone()
        }
    }
}

pub struct DialogueOverlay {
    renderer: Arc<dyn Renderer>,
    style: DialogueStyle,
    font_file: Option<PathBuf>,
}

impl DialogueOverlay {
    pub fn new(renderer: Arc<dyn Renderer>, width: u32, height: u32) -> Self {
        Self {
            renderer,
            style: DialogueStyle::default().scaled(width, height),
            font_file: None,
        }
    }

    pub fn with_font(mut self, font_file: Option<PathBuf>) -> Self {
        self.font_file = font_file;
        self
    }

    pub fn style(&self) -> &DialogueStyle {
        &self.style
    }

    pub fn plan(&self, input: &VideoClip, timeline: &Timeline, output: &Path) -> RenderRequest {
        let style = &self.style;
        let mut request = RenderRequest::new("dialogue_overlay", output);
        let source = request.add_input(RenderInput::File(input.path.clone()));

        request.push_filter(FilterOp::DrawBox {
            input: StreamRef::video(source),
            x: style.box_x,
            y: style.box_y,
            width: style.box_width,
            height: style.box_height,
            color: style.box_color.clone(),
            alpha: style.box_alpha,
            output: "box".to_string(),
        });

        let mut current = "box".to_string();
        for (i, entry) in timeline.overlay_entries().enumerate() {
            let window = entry.window();
            let text_y = match entry.line.speaker() {
                Some(name) => {
                    let label = format!("n{i}");
                    request.push_filter(FilterOp::DrawText {
                        input: StreamRef::label(current),
                        text: name.to_string(),
                        x: TextX::Fixed(style.name_x),
                        y: style.name_y,
                        font_size: style.name_size,
                        color: style.name_color.clone(),
                        font_file: self.font_file.clone(),
                        window: Some(window),
                        output: label.clone(),
                    });
                    current = label;
                    style.text_y
                }
                None => style.narration_y,
            };

            let label = format!("t{i}");
            request.push_filter(FilterOp::DrawText {
                input: StreamRef::label(current),
                text: entry.line.content.trim().to_string(),
                x: TextX::Fixed(style.text_x),
                y: text_y,
                font_size: style.text_size,
                color: style.text_color.clone(),
                font_file: self.font_file.clone(),
                window: Some(window),
                output: label.clone(),
            });
            current = label;
        }

        request.map(StreamMap::required(StreamRef::label(current)));
        request.map(StreamMap::optional(StreamRef::audio(source)));
        request.encode = EncodeSettings::INTERMEDIATE;
        request
    }

    /// Burn the timeline's dialogue into `input`, writing `output`.
    pub async fn render(
        &self,
        input: &VideoClip,
        timeline: &Timeline,
        output: &Path,
    ) -> BestEffort {
        let request = self.plan(input, timeline, output);
        let lines = timeline.overlay_entries().count();
        tracing::info!(lines, output = %output.display(), "Rendering dialogue overlay");

        let reason = match self.renderer.render(&request).await {
            Ok(result) if result.succeeded() => return Ok(input.relocated(output)),
            Ok(result) => result.failure_summary(),
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            stage = %Stage::DialogueOverlay,
            input = %input.path.display(),
            reason = %reason,
            "Dialogue overlay failed, keeping scene without subtitles"
        );
        Err(Degraded::new(Stage::DialogueOverlay, input, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{MediaProbe, ProcessResult};
    use async_trait::async_trait;
    use storyreel_common::error::StoryreelResult;
    use storyreel_scene_model::dialogue::DialogueLine;
    use storyreel_scene_model::timeline::TimeWindow;

    struct FailingRenderer;

    #[async_trait]
    impl Renderer for FailingRenderer {
        async fn render(&self, _request: &RenderRequest) -> StoryreelResult<ProcessResult> {
            Ok(ProcessResult {
                success: false,
                exit_code: Some(1),
                stderr: "drawtext: cannot find font".to_string(),
                ..ProcessResult::default()
            })
        }

        async fn probe(&self, _path: &Path) -> Option<MediaProbe> {
            None
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn timeline() -> Timeline {
        Timeline::build(&[
            DialogueLine::narration(1, "Morning in the park.", 2.0),
            DialogueLine::spoken(2, "Alice", "   ", 1.0),
            DialogueLine::spoken(3, "Alice", "It's 5:00!", 3.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_style_scales_to_720p() {
        let style = DialogueStyle::default().scaled(1280, 720);
        assert_eq!(style.box_x, 107);
        assert_eq!(style.box_y, 453);
        assert_eq!(style.box_width, 1067);
        assert_eq!(style.box_height, 200);
        assert_eq!(style.text_size, 19);
        assert_eq!(style.name_color, "yellow");
    }

    #[test]
    fn test_plan_windows_and_labels() {
        let overlay = DialogueOverlay::new(Arc::new(FailingRenderer), 1920, 1080);
        let clip = VideoClip::new("/tmp/scene.mp4", 6.5, 1920, 1080);
        let request = overlay.plan(&clip, &timeline(), Path::new("/tmp/dialogue.mp4"));
        assert!(request.validate_graph().is_ok());

        let texts: Vec<(&str, Option<&TimeWindow>)> = request.draw_texts().collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0].0, "Morning in the park.");
        assert_eq!(texts[0].1, Some(&TimeWindow::new(0.0, 2.0)));
        assert_eq!(texts[1].0, "Alice");
        assert_eq!(texts[2].0, "It's 5:00!");
        assert_eq!(texts[2].1, Some(&TimeWindow::new(3.0, 6.5)));

        let narration_y = request.filters.iter().find_map(|op| match op {
            FilterOp::DrawText { text, y, .. } if text == "Morning in the park." => Some(*y),
            _ => None,
        });
        assert_eq!(narration_y, Some(725));
        assert_eq!(request.maps[1], StreamMap::optional(StreamRef::audio(0)));
    }

    #[tokio::test]
    async fn test_failure_passes_input_through() {
        let overlay = DialogueOverlay::new(Arc::new(FailingRenderer), 1920, 1080);
        let clip = VideoClip::new("/tmp/scene.mp4", 6.5, 1920, 1080);
        let degraded = overlay
            .render(&clip, &timeline(), Path::new("/tmp/dialogue.mp4"))
            .await
            .unwrap_err();
        assert_eq!(degraded.stage, Stage::DialogueOverlay);
        assert!(degraded.reason.contains("cannot find font"));
        assert_eq!(degraded.into_clip(), clip);
    }
}
