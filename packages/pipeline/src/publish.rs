//! Publish stage: upload the rendered map when a bucket is configured.

use fire_map_publish::{UploadOutcome, publish_map};

use crate::config::PipelineConfig;

/// Result of a publish. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No bucket configured.
    Disabled,
    Published(UploadOutcome),
    /// The upload failed; the local map is unaffected.
    Failed { error: String },
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Published(outcome) => write!(f, "{outcome}"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Uploads the configured map output.
///
/// Errors are logged and returned as [`PublishOutcome::Failed`] so a failed
/// upload never fails the run.
pub async fn run(config: &PipelineConfig) -> PublishOutcome {
    let Some(target) = config.publish_target() else {
        log::info!("No bucket configured, skipping publish");
        return PublishOutcome::Disabled;
    };

    log::info!("Publishing {} to {}", config.render.output.display(), target.uri());
    match publish_map(&target, &config.render.output).await {
        Ok(outcome) => {
            log::info!("Published {}: {outcome}", target.uri());
            PublishOutcome::Published(outcome)
        }
        Err(e) => {
            log::warn!("Failed to publish {}: {e}", target.uri());
            PublishOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
