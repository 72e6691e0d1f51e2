//! Shared fixtures for render-engine integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storyreel_common::config::AssemblyConfig;
use storyreel_common::error::StoryreelResult;
use storyreel_render_engine::graph::RenderRequest;
use storyreel_render_engine::{AssemblyEngine, MediaProbe, ProcessResult, Renderer};
use tempfile::TempDir;

/// Fake renderer that records requests and writes placeholder outputs.
///
/// Renders whose output filename starts with a configured prefix fail.
#[derive(Default)]
pub struct RecordingRenderer {
    requests: Mutex<Vec<RenderRequest>>,
    fail_prefixes: Vec<String>,
    probe: Option<MediaProbe>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.fail_prefixes.push(prefix.to_string());
        self
    }

    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn purposes(&self) -> Vec<&'static str> {
        self.requests().iter().map(|r| r.purpose).collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn should_fail(&self, output: &Path) -> bool {
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.fail_prefixes.iter().any(|prefix| name.starts_with(prefix))
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, request: &RenderRequest) -> StoryreelResult<ProcessResult> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = if self.should_fail(&request.output) {
            ProcessResult {
                success: false,
                exit_code: Some(1),
                stderr: "simulated renderer failure".to_string(),
                ..ProcessResult::default()
            }
        } else {
            if let Some(parent) = request.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&request.output, request.purpose)?;
            ProcessResult {
                success: true,
                exit_code: Some(0),
                output_exists: true,
                ..ProcessResult::default()
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(result)
    }

    async fn probe(&self, _path: &Path) -> Option<MediaProbe> {
        self.probe
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Temporary asset and output directories.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn config(&self) -> AssemblyConfig {
        AssemblyConfig::with_dirs(self.dir.path().join("out"), self.dir.path().join("tmp"))
    }

    pub fn engine(&self, renderer: &Arc<RecordingRenderer>) -> AssemblyEngine {
        AssemblyEngine::new(self.config(), renderer.clone()).unwrap()
    }

    /// Create a placeholder asset file.
    pub fn asset(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("assets").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, name).unwrap();
        path
    }

    /// A path under the asset directory that does not exist.
    pub fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join("assets").join(name)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}
