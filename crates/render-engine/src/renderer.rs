//! Renderer backend boundary.
//!
//! Every stage produces its output by handing a [`RenderRequest`] to a
//! [`Renderer`]. The engine wraps whatever backend it is given in a
//! [`ThrottledRenderer`], so the number of concurrently running render
//! processes never exceeds the configured limit.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use tokio::sync::Semaphore;

use crate::graph::RenderRequest;

/// Outcome of one render invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    /// The process exited with status zero.
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Captured diagnostic output.
    pub stderr: String,
    /// The requested output file exists after the run.
    pub output_exists: bool,
    pub elapsed: Duration,
}

impl ProcessResult {
    /// A run counts only when the process succeeded and left its output behind.
    pub fn succeeded(&self) -> bool {
        self.success && self.output_exists
    }

    /// Last few lines of stderr, for error messages.
    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(8);
        lines[start..].join("\n")
    }

    /// Short failure description.
    pub fn failure_summary(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None if self.success => "no output file".to_string(),
            None => "terminated".to_string(),
        };
        let tail = self.stderr_tail();
        if tail.is_empty() {
            status
        } else {
            format!("{status}: {tail}")
        }
    }
}

/// Stream properties read from an existing media file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// A backend that turns render requests into files.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Execute one request and report how it went.
    ///
    /// `Err` is reserved for failing to run the backend at all. A backend
    /// that ran and failed reports that through [`ProcessResult`].
    async fn render(&self, request: &RenderRequest) -> StoryreelResult<ProcessResult>;

    /// Inspect a media file. `None` when the file cannot be read.
    async fn probe(&self, path: &Path) -> Option<MediaProbe>;

    /// Check if this backend is usable on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Caps the number of in-flight renders across every caller that shares it.
#[derive(Clone)]
pub struct ThrottledRenderer {
    inner: Arc<dyn Renderer>,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl ThrottledRenderer {
    pub fn new(inner: Arc<dyn Renderer>, max_concurrent: usize) -> Self {
        let limit = max_concurrent.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Renders currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }
}

#[async_trait]
impl Renderer for ThrottledRenderer {
    async fn render(&self, request: &RenderRequest) -> StoryreelResult<ProcessResult> {
        // The permit is released when this future completes or is dropped.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| StoryreelError::renderer(format!("render queue closed: {e}")))?;
        tracing::debug!(
            purpose = request.purpose,
            output = %request.output.display(),
            in_flight = self.in_flight(),
            "Render permit acquired"
        );
        self.inner.render(request).await
    }

    async fn probe(&self, path: &Path) -> Option<MediaProbe> {
        self.inner.probe(path).await
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowRenderer {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for SlowRenderer {
        async fn render(&self, _request: &RenderRequest) -> StoryreelResult<ProcessResult> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(ProcessResult {
                success: true,
                output_exists: true,
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
            "slow"
        }
    }

    #[tokio::test]
    async fn test_throttle_caps_in_flight_renders() {
        let inner = Arc::new(SlowRenderer {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let throttled = ThrottledRenderer::new(inner.clone(), 2);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..6 {
            let renderer = throttled.clone();
            tasks.spawn(async move {
                let request = RenderRequest::new("test", format!("out_{i}.mp4"));
                renderer.render(&request).await
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().unwrap().succeeded());
        }
        assert_eq!(inner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(throttled.in_flight(), 0);
    }

    #[test]
    fn test_failure_summary() {
        let result = ProcessResult {
            success: false,
            exit_code: Some(1),
            stderr: "line one\nNo such filter: 'bogus'".to_string(),
            ..ProcessResult::default()
        };
        assert!(!result.succeeded());
        assert!(result.failure_summary().starts_with("exit code 1:"));
        assert!(result.failure_summary().contains("bogus"));

        let no_output = ProcessResult {
            success: true,
            ..ProcessResult::default()
        };
        assert!(!no_output.succeeded());
        assert_eq!(no_output.failure_summary(), "no output file");
    }
}
