//! Render stage: write the interactive map from the processed files.

use std::path::PathBuf;

use fire_map_render::{RenderReport, render_file};

use crate::PipelineError;
use crate::config::PipelineConfig;

/// Result of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub output: PathBuf,
    pub report: RenderReport,
}

impl std::fmt::Display for RenderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.output.display(), self.report)
    }
}

/// Renders the converted boundary and clipped set to the configured output.
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] if the transform stage has not
/// produced its files yet, or [`PipelineError::Render`] if rendering or the
/// write fails.
pub fn run(config: &PipelineConfig) -> Result<RenderOutcome, PipelineError> {
    let paths = config.data_paths();
    let boundary = paths.processed_boundary();
    let clipped = paths.clipped_detections();

    for (what, path) in [("processed boundary", &boundary), ("clipped detections", &clipped)] {
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                what,
                path: path.clone(),
            });
        }
    }

    let output = config.render.output.clone();
    let report = render_file(&boundary, &clipped, &output, &config.render_options())?;
    Ok(RenderOutcome { output, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProvider, config, csv, now, row};

    #[tokio::test]
    async fn renders_after_transform() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let now = now();
        let provider = FakeProvider::new(csv(&[row(now, 34.1, -118.2, 30, 5.0)]));
        crate::fetch::run(&config, &provider, now).await.unwrap();
        crate::transform::run(&config, now).unwrap();

        let outcome = run(&config).unwrap();

        assert_eq!(outcome.report.markers, 1);
        let html = std::fs::read_to_string(&outcome.output).unwrap();
        assert!(html.contains("Los Angeles Active Fire Map"));
        assert!(html.contains("LACo Boundary"));
    }

    #[test]
    fn missing_inputs_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let result = run(&config);
        assert!(matches!(
            result,
            Err(PipelineError::MissingInput {
                what: "processed boundary",
                ..
            })
        ));
        assert!(!config.render.output.exists());
    }
}
