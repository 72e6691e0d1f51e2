//! Title and credits cards burned over a finished video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storyreel_scene_model::clip::VideoClip;
use storyreel_scene_model::layer::{scale_axis, REFERENCE_HEIGHT};
use storyreel_scene_model::timeline::TimeWindow;

use crate::graph::{
    EncodeSettings, FilterOp, RenderInput, RenderRequest, StreamMap, StreamRef, TextX,
};
use crate::renderer::Renderer;
use crate::stage::{BestEffort, Degraded, Stage};

const TITLE_SECS: f64 = 3.0;
const CREDITS_SECS: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleCards {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub credits: Option<String>,
}

impl TitleCards {
    pub fn is_empty(&self) -> bool {
        non_blank(&self.title).is_none() && non_blank(&self.credits).is_none()
    }
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

pub struct TitleCardRenderer {
    renderer: Arc<dyn Renderer>,
    font_file: Option<PathBuf>,
}

impl TitleCardRenderer {
    pub fn new(renderer: Arc<dyn Renderer>, font_file: Option<PathBuf>) -> Self {
        Self {
            renderer,
            font_file,
        }
    }

    /// Title for the first three seconds at the top; credits for the last
    /// five seconds near the bottom.
    pub fn plan(&self, input: &VideoClip, cards: &TitleCards, output: &Path) -> RenderRequest {
        let y = |v: i32| scale_axis(v, input.height, REFERENCE_HEIGHT);
        let size = |v: i32| y(v).max(1) as u32;
        let duration = input.duration_secs.max(0.0);

        let mut request = RenderRequest::new("title_cards", output);
        let source = request.add_input(RenderInput::File(input.path.clone()));
        let mut current = StreamRef::video(source);

        if let Some(title) = non_blank(&cards.title) {
            request.push_filter(FilterOp::DrawText {
                input: current,
                text: title.to_string(),
                x: TextX::Centered,
                y: y(100),
                font_size: size(48),
                color: "white".to_string(),
                font_file: self.font_file.clone(),
                window: Some(TimeWindow::new(0.0, TITLE_SECS.min(duration))),
                output: "title".to_string(),
            });
            current = StreamRef::label("title");
        }
        if let Some(credits) = non_blank(&cards.credits) {
            request.push_filter(FilterOp::DrawText {
                input: current,
                text: credits.to_string(),
                x: TextX::Centered,
                y: input.height as i32 - y(100),
                font_size: size(24),
                color: "white".to_string(),
                font_file: self.font_file.clone(),
                window: Some(TimeWindow::new((duration - CREDITS_SECS).max(0.0), duration)),
                output: "credits".to_string(),
            });
            current = StreamRef::label("credits");
        }

        request.map(StreamMap::required(current));
        request.map(StreamMap::optional(StreamRef::audio(source)));
        request.encode = EncodeSettings::INTERMEDIATE;
        request
    }

    pub async fn render(&self, input: &VideoClip, cards: &TitleCards, output: &Path) -> BestEffort {
        if cards.is_empty() {
            return Ok(input.clone());
        }

        let request = self.plan(input, cards, output);
        let reason = match self.renderer.render(&request).await {
            Ok(result) if result.succeeded() => return Ok(input.relocated(output)),
            Ok(result) => result.failure_summary(),
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            stage = %Stage::TitleCards,
            input = %input.path.display(),
            reason = %reason,
            "Title cards failed, keeping video without them"
        );
        Err(Degraded::new(Stage::TitleCards, input, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{MediaProbe, ProcessResult};
    use async_trait::async_trait;
    use storyreel_common::error::StoryreelResult;

    struct Unused;

    #[async_trait]
    impl Renderer for Unused {
        async fn render(&self, _request: &RenderRequest) -> StoryreelResult<ProcessResult> {
            panic!("no render expected");
        }

        async fn probe(&self, _path: &Path) -> Option<MediaProbe> {
            None
        }

        fn is_available(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "unused"
        }
    }

    #[test]
    fn test_card_windows() {
        let cards = TitleCards {
            title: Some("The Park".into()),
            credits: Some("Made with storyreel".into()),
        };
        let clip = VideoClip::new("/tmp/final.mp4", 20.0, 1920, 1080);
        let request = TitleCardRenderer::new(Arc::new(Unused), None).plan(
            &clip,
            &cards,
            Path::new("/tmp/ui_final.mp4"),
        );
        assert!(request.validate_graph().is_ok());

        let texts: Vec<(&str, Option<&TimeWindow>)> = request.draw_texts().collect();
        assert_eq!(texts[0], ("The Park", Some(&TimeWindow::new(0.0, 3.0))));
        assert_eq!(
            texts[1],
            ("Made with storyreel", Some(&TimeWindow::new(15.0, 20.0)))
        );
        assert_eq!(request.maps[0], StreamMap::required(StreamRef::label("credits")));
    }

    #[test]
    fn test_short_clip_clamps_windows() {
        let cards = TitleCards {
            title: None,
            credits: Some("fin".into()),
        };
        let clip = VideoClip::new("/tmp/short.mp4", 2.0, 1280, 720);
        let request = TitleCardRenderer::new(Arc::new(Unused), None).plan(
            &clip,
            &cards,
            Path::new("/tmp/ui_short.mp4"),
        );
        let texts: Vec<(&str, Option<&TimeWindow>)> = request.draw_texts().collect();
        assert_eq!(texts, vec![("fin", Some(&TimeWindow::new(0.0, 2.0)))]);
    }

    #[tokio::test]
    async fn test_no_cards_returns_input() {
        let clip = VideoClip::new("/tmp/final.mp4", 20.0, 1920, 1080);
        let cards = TitleCards {
            title: Some("  ".into()),
            credits: None,
        };
        let out = TitleCardRenderer::new(Arc::new(Unused), None)
            .render(&clip, &cards, Path::new("/tmp/ui.mp4"))
            .await
            .unwrap();
        assert_eq!(out, clip);
    }
}
