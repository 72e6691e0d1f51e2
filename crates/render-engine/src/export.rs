//! Export to a `(format, quality)` matrix.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_scene_model::clip::VideoClip;
use storyreel_scene_model::profile::ExportProfile;

use crate::graph::{RenderInput, RenderRequest, StreamMap, StreamRef};
use crate::renderer::Renderer;

/// Outcome of exporting one clip to several profiles.
///
/// A failed pair never aborts the others; it is listed in `failures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub outputs: BTreeMap<ExportProfile, VideoClip>,
    pub failures: BTreeMap<ExportProfile, String>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn output_paths(&self) -> impl Iterator<Item = (&ExportProfile, &Path)> {
        self.outputs.iter().map(|(profile, clip)| (profile, clip.path()))
    }
}

pub struct Exporter {
    renderer: Arc<dyn Renderer>,
}

impl Exporter {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }

    /// Output path for one profile.
    pub fn output_path(input: &VideoClip, profile: &ExportProfile, dir: &Path) -> PathBuf {
        dir.join(profile.file_name(&input.stem()))
    }

    /// Describe the encode for one profile. Depends only on the profile and
    /// the input, never on the output location.
    pub fn plan(input: &VideoClip, profile: &ExportProfile, output: &Path) -> RenderRequest {
        let mut request = RenderRequest::new("export", output);
        let source = request.add_input(RenderInput::File(input.path.clone()));
        request.map(StreamMap::required(StreamRef::video(source)));
        request.map(StreamMap::optional(StreamRef::audio(source)));
        request.encode = profile.encode_params().into();
        request
    }

    pub async fn export(
        &self,
        input: &VideoClip,
        profiles: &[ExportProfile],
        dir: &Path,
    ) -> StoryreelResult<ExportReport> {
        if !input.exists() {
            return Err(StoryreelError::missing_asset(&input.path));
        }
        if profiles.is_empty() {
            return Err(StoryreelError::invalid_input("No export profiles requested"));
        }
        std::fs::create_dir_all(dir)?;

        let mut report = ExportReport::default();
        for profile in profiles {
            let output = Self::output_path(input, profile, dir);
            let request = Self::plan(input, profile, &output);
            tracing::info!(
                profile = %profile,
                output = %output.display(),
                "Exporting"
            );

            let failure = match self.renderer.render(&request).await {
                Ok(result) if result.succeeded() => {
                    report.outputs.insert(*profile, input.relocated(&output));
                    continue;
                }
                Ok(result) => result.failure_summary(),
                Err(e) => e.to_string(),
            };
            tracing::error!(
                profile = %profile,
                output = %output.display(),
                reason = %failure,
                "Export failed"
            );
            report.failures.insert(*profile, failure);
        }

        tracing::info!(
            exported = report.outputs.len(),
            failed = report.failures.len(),
            "Export finished"
        );
        Ok(report)
    }
}
