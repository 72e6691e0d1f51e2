mod support;

use std::sync::Arc;
use std::time::Duration;

use storyreel_common::error::StoryreelError;
use storyreel_render_engine::graph::FilterOp;
use storyreel_render_engine::{MediaProbe, SceneRequest, Stage};
use storyreel_scene_model::dialogue::{DialogueLine, ScreenPosition};
use storyreel_scene_model::scene::Scene;
use storyreel_scene_model::timeline::TimeWindow;

use support::{Fixture, RecordingRenderer};

fn three_line_scene(id: &str) -> Scene {
    Scene::new(
        id,
        vec![
            DialogueLine::spoken(1, "Alice", "Lovely day.", 2.0)
                .with_position(ScreenPosition::Left),
            DialogueLine::narration(2, "Bob walks in.", 3.5),
            DialogueLine::spoken(3, "Bob", "It's 5:00, let's go!", 1.0)
                .with_position(ScreenPosition::Right),
        ],
    )
}

#[tokio::test]
async fn three_line_scene_gets_contiguous_windows() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new());
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"));
    let output = engine.compose_scene(&request).await.unwrap();

    let windows: Vec<TimeWindow> = output
        .timeline
        .entries()
        .iter()
        .map(|entry| entry.window())
        .collect();
    assert_eq!(
        windows,
        vec![
            TimeWindow::new(0.0, 2.0),
            TimeWindow::new(2.0, 5.5),
            TimeWindow::new(5.5, 6.5),
        ]
    );
    assert!((output.timeline.total_duration() - 6.5).abs() < 1e-6);
    assert!((output.clip.duration_secs - 6.5).abs() < 1e-6);
    assert_eq!((output.clip.width, output.clip.height), (1920, 1080));
    assert!(!output.is_degraded());

    let requests = renderer.requests();
    let overlay = &requests[1];
    let texts: Vec<_> = overlay.draw_texts().collect();
    assert_eq!(
        texts,
        vec![
            ("Alice", Some(&TimeWindow::new(0.0, 2.0))),
            ("Lovely day.", Some(&TimeWindow::new(0.0, 2.0))),
            ("Bob walks in.", Some(&TimeWindow::new(2.0, 5.5))),
            ("Bob", Some(&TimeWindow::new(5.5, 6.5))),
            ("It's 5:00, let's go!", Some(&TimeWindow::new(5.5, 6.5))),
        ]
    );
}

#[tokio::test]
async fn stages_run_in_order_and_write_to_temp_dir() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new());
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"))
        .with_character("Alice", fixture.asset("alice.mp4"))
        .with_audio("Alice", fixture.asset("alice.wav"));
    let output = engine.compose_scene(&request).await.unwrap();

    assert_eq!(
        renderer.purposes(),
        vec!["composite", "dialogue_overlay", "audio_mix"]
    );
    let requests = renderer.requests();
    for request in &requests {
        assert!(request.output.starts_with(fixture.temp_dir()));
        assert!(request.validate_graph().is_ok());
    }
    // Each stage reads the previous stage's output.
    assert_eq!(requests[1].inputs[0].path(), requests[0].output.as_path());
    assert_eq!(requests[2].inputs[0].path(), requests[1].output.as_path());
    assert_eq!(output.clip.path, requests[2].output);
    assert_eq!(output.clip.audio_path.as_ref(), Some(&requests[2].output));
}

#[tokio::test]
async fn duration_drift_is_logged_without_failing_the_scene() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new().with_probe(MediaProbe {
        duration_secs: Some(7.0),
        width: Some(1920),
        height: Some(1080),
        has_video: true,
        has_audio: false,
    }));
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"));
    let output = engine.compose_scene(&request).await.unwrap();

    assert!(!output.is_degraded());
    assert!((output.clip.duration_secs - 6.5).abs() < 1e-6);
    assert_eq!(renderer.purposes(), vec!["composite", "dialogue_overlay"]);
}

#[tokio::test]
async fn missing_background_fails_before_any_render() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new());
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.missing("bg.png"));
    let err = engine.compose_scene(&request).await.unwrap_err();

    assert!(err.is_invalid_input());
    assert!(matches!(err, StoryreelError::MissingAsset { .. }));
    assert_eq!(renderer.call_count(), 0);
}

#[tokio::test]
async fn invalid_script_fails_before_any_render() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new());
    let engine = fixture.engine(&renderer);
    let background = fixture.asset("bg.png");

    let empty = SceneRequest::new(Scene::new("empty", vec![]), &background);
    assert!(matches!(
        engine.compose_scene(&empty).await.unwrap_err(),
        StoryreelError::EmptyScene
    ));

    let zero = SceneRequest::new(
        Scene::new("zero", vec![DialogueLine::narration(1, "...", 0.0)]),
        &background,
    );
    assert!(matches!(
        engine.compose_scene(&zero).await.unwrap_err(),
        StoryreelError::InvalidDuration { order: 1, .. }
    ));
    assert_eq!(renderer.call_count(), 0);
}

#[tokio::test]
async fn overlay_failure_returns_composited_clip() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new().failing_on("dialogue_"));
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"));
    let output = engine.compose_scene(&request).await.unwrap();

    let composite_path = renderer.requests()[0].output.clone();
    assert_eq!(output.clip.path, composite_path);
    assert!(output.clip.exists());
    assert!(output.is_degraded());
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].stage, Stage::DialogueOverlay);
    assert!(output.warnings[0].message.contains("simulated renderer failure"));
}

#[tokio::test]
async fn audio_failure_keeps_subtitled_clip() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new().failing_on("audio_"));
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"))
        .with_audio("Bob", fixture.asset("bob.wav"));
    let output = engine.compose_scene(&request).await.unwrap();

    let requests = renderer.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(output.clip.path, requests[1].output);
    assert_eq!(output.clip.audio_path, None);
    assert_eq!(output.warnings[0].stage, Stage::AudioMix);
}

#[tokio::test]
async fn composite_failure_is_fatal() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new().failing_on("scene_"));
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"));
    let err = engine.compose_scene(&request).await.unwrap_err();
    assert!(matches!(err, StoryreelError::CompositionFailed { .. }));
    assert_eq!(renderer.call_count(), 1);
}

#[tokio::test]
async fn repeated_speaker_audio_is_delayed_per_line() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new());
    let engine = fixture.engine(&renderer);

    let scene = Scene::new(
        "monologue",
        vec![
            DialogueLine::spoken(1, "Alice", "First.", 1.0),
            DialogueLine::spoken(2, "Alice", "Second.", 2.0),
        ],
    );
    let request = SceneRequest::new(scene, fixture.asset("bg.png"))
        .with_audio("Alice", fixture.asset("alice.wav"));
    engine.compose_scene(&request).await.unwrap();

    let mix = renderer
        .requests()
        .into_iter()
        .find(|r| r.purpose == "audio_mix")
        .unwrap();
    let delays: Vec<u64> = mix
        .filters
        .iter()
        .filter_map(|op| match op {
            FilterOp::Delay { millis, .. } => Some(*millis),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![0, 1000]);
    assert_eq!(mix.duration_secs, Some(3.0));
}

#[tokio::test]
async fn base_audio_joins_the_mix_when_probed() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new().with_probe(MediaProbe {
        has_video: true,
        has_audio: true,
        ..MediaProbe::default()
    }));
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"))
        .with_audio("Alice", fixture.asset("alice.wav"))
        .with_audio("Bob", fixture.asset("bob.wav"));
    engine.compose_scene(&request).await.unwrap();

    let mix = renderer.requests().pop().unwrap();
    let mix_inputs = mix.filters.iter().find_map(|op| match op {
        FilterOp::Mix { inputs, .. } => Some(inputs.len()),
        _ => None,
    });
    assert_eq!(mix_inputs, Some(3));
}

#[tokio::test]
async fn missing_character_clip_is_omitted() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new());
    let engine = fixture.engine(&renderer);

    let request = SceneRequest::new(three_line_scene("park"), fixture.asset("bg.png"))
        .with_character("Alice", fixture.asset("alice.png"))
        .with_character("Bob", fixture.missing("bob.mp4"));
    let output = engine.compose_scene(&request).await.unwrap();
    assert!(output.clip.exists());

    let requests = renderer.requests();
    let composite = &requests[0];
    assert_eq!(composite.inputs.len(), 2);
    let overlays: Vec<(i32, i32)> = composite
        .filters
        .iter()
        .filter_map(|op| match op {
            FilterOp::Overlay { x, y, .. } => Some((*x, *y)),
            _ => None,
        })
        .collect();
    assert_eq!(overlays, vec![(200, 150)]);
}

#[tokio::test]
async fn batch_composition_is_throttled_and_ordered() {
    let fixture = Fixture::new();
    let renderer = Arc::new(RecordingRenderer::new().with_delay(Duration::from_millis(25)));
    let engine = fixture.engine(&renderer);
    let background = fixture.asset("bg.png");

    let requests: Vec<SceneRequest> = (0..4)
        .map(|i| SceneRequest::new(three_line_scene(&format!("scene{i}")), &background))
        .collect();
    let results = engine.compose_scenes(requests).await;

    assert_eq!(results.len(), 4);
    for (i, result) in results.iter().enumerate() {
        let output = result.as_ref().unwrap();
        let name = output.clip.path.file_name().unwrap().to_string_lossy();
        assert!(name.contains(&format!("scene{i}_")), "{name}");
    }
    assert_eq!(renderer.call_count(), 8);
    assert!(renderer.peak_in_flight() <= 2);
    assert_eq!(renderer.peak_in_flight(), 2);
}
