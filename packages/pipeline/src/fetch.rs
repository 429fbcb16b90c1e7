//! Fetch stage: download, window, snapshot, merge.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use fire_map_detection_models::TimeWindow;
use fire_map_source::{HotspotProvider, parse_detections};
use fire_map_store::atomic::write_bytes_atomic;
use fire_map_store::paths::ensure_dir;
use fire_map_store::{MergeReport, merge_into, write_snapshot};

use crate::PipelineError;
use crate::config::PipelineConfig;

/// Result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing fell inside the trailing window; no file was written.
    NoRecentDetections {
        /// Detections returned by the provider.
        fetched: usize,
    },
    /// Recent detections were snapshotted and merged into the store.
    Merged {
        fetched: usize,
        snapshot: PathBuf,
        report: MergeReport,
        /// Whether a fresh boundary was saved this run.
        boundary_saved: bool,
    },
    /// The provider request or its CSV failed. Nothing was written and the
    /// existing store is still usable by later stages.
    Failed { error: String },
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecentDetections { fetched } => {
                write!(f, "no recent detections ({fetched} fetched)")
            }
            Self::Merged {
                fetched, report, ..
            } => write!(f, "{fetched} fetched, store {report}"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Runs the fetch stage against `provider` with `now` as the window end.
///
/// A boundary that cannot be downloaded or saved is logged and skipped.
///
/// # Errors
///
/// Returns [`PipelineError::Source`] if the detection request fails or the
/// CSV lacks `acq_date`/`acq_time`, and [`PipelineError::Store`] if the
/// snapshot or merge fails (the existing store is left intact).
pub async fn run(
    config: &PipelineConfig,
    provider: &dyn HotspotProvider,
    now: DateTime<Utc>,
) -> Result<FetchOutcome, PipelineError> {
    let paths = config.data_paths();
    ensure_dir(&paths.raw_dir())?;

    log::info!("Fetching {} detections for {}", provider.id(), paths.region());

    let boundary_saved = match provider.fetch_boundary().await {
        Ok(bytes) => match write_bytes_atomic(&paths.raw_boundary(), &bytes) {
            Ok(()) => {
                log::info!(
                    "Saved boundary ({} bytes) to {}",
                    bytes.len(),
                    paths.raw_boundary().display()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to save boundary, continuing: {e}");
                false
            }
        },
        Err(e) => {
            log::warn!("Failed to fetch boundary, continuing: {e}");
            false
        }
    };

    let body = provider.fetch_detections().await?;
    let detections = parse_detections(&body)?;
    let fetched = detections.len();

    let window = TimeWindow::trailing(now, config.fetch.window_hours);
    let recent = window.retain(detections);
    log::info!(
        "{} of {fetched} detections fall between {} and {}",
        recent.len(),
        window.start(),
        window.end()
    );

    if recent.is_empty() {
        log::info!("No detections in the last {} hours", config.fetch.window_hours);
        return Ok(FetchOutcome::NoRecentDetections { fetched });
    }

    let snapshot = write_snapshot(&paths, now, &recent)?;
    let report = merge_into(&paths.accumulated_store(), recent)?;

    Ok(FetchOutcome::Merged {
        fetched,
        snapshot,
        report,
        boundary_saved,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use fire_map_source::SourceError;

    use super::*;
    use crate::test_support::{FakeProvider, config, csv, now, row};

    #[tokio::test]
    async fn first_fetch_creates_store_from_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let now = now();
        let provider = FakeProvider::new(csv(&[
            row(now, 34.1, -118.2, 10, 2.0),
            row(now, 34.2, -118.3, 23 * 60, 4.0),
            row(now, 34.3, -118.4, 25 * 60, 1.0),
        ]));

        let outcome = run(&config, &provider, now).await.unwrap();

        let FetchOutcome::Merged {
            fetched,
            snapshot,
            report,
            boundary_saved,
        } = outcome
        else {
            panic!("expected a merge, got {outcome:?}");
        };
        assert_eq!(fetched, 3);
        assert_eq!(report.written, 2);
        assert!(boundary_saved);
        assert!(snapshot.ends_with("VIIRS_FireData_LACo_20250108_120000.csv"));

        let store = fire_map_store::load(&config.data_paths().accumulated_store()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(fire_map_store::load(&snapshot).unwrap().len(), 2);
        assert!(config.data_paths().raw_boundary().exists());
    }

    #[tokio::test]
    async fn merges_with_existing_store_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let earlier = now() - Duration::hours(6);

        let first: Vec<String> = (0..5)
            .map(|i| row(earlier, 34.0 + f64::from(i) / 10.0, -118.2, 10, 1.0))
            .collect();
        run(&config, &FakeProvider::new(csv(&first)), earlier)
            .await
            .unwrap();

        let now = now();
        let second = vec![
            first[0].clone(),
            first[1].clone(),
            row(now, 34.9, -118.5, 5, 3.5),
        ];
        let outcome = run(&config, &FakeProvider::new(csv(&second)), now)
            .await
            .unwrap();

        let FetchOutcome::Merged { report, .. } = outcome else {
            panic!("expected a merge, got {outcome:?}");
        };
        assert_eq!(report.existing, 5);
        assert_eq!(report.incoming, 3);
        assert_eq!(report.written, 6);
        assert_eq!(
            fire_map_store::load(&config.data_paths().accumulated_store())
                .unwrap()
                .len(),
            6
        );
    }

    #[tokio::test]
    async fn nothing_recent_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let now = now();
        let provider = FakeProvider::new(csv(&[row(now, 34.1, -118.2, 30 * 60, 2.0)]));

        let outcome = run(&config, &provider, now).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NoRecentDetections { fetched: 1 });
        assert!(!config.data_paths().accumulated_store().exists());
    }

    #[tokio::test]
    async fn boundary_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let now = now();
        let mut provider = FakeProvider::new(csv(&[row(now, 34.1, -118.2, 5, 2.0)]));
        provider.boundary = Err(503);

        let outcome = run(&config, &provider, now).await.unwrap();
        assert!(matches!(
            outcome,
            FetchOutcome::Merged {
                boundary_saved: false,
                ..
            }
        ));
        assert!(!config.data_paths().raw_boundary().exists());
    }

    #[tokio::test]
    async fn detection_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut provider = FakeProvider::new(String::new());
        provider.detections = Err(500);

        let result = run(&config, &provider, now()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Source(SourceError::Status { status: 500, .. }))
        ));
    }

    #[tokio::test]
    async fn missing_time_columns_abort_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let provider = FakeProvider::new("latitude,longitude,frp\n34.1,-118.2,1.0\n".to_string());

        let result = run(&config, &provider, now()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Source(SourceError::MissingFields { .. }))
        ));
        assert!(!config.data_paths().accumulated_store().exists());
    }

    #[tokio::test]
    async fn corrupt_store_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = config.data_paths().accumulated_store();
        ensure_dir(&config.data_paths().raw_dir()).unwrap();
        std::fs::write(&store, "latitude,longitude\nnot-a-number,x\n").unwrap();
        let before = std::fs::read(&store).unwrap();

        let now = now();
        let provider = FakeProvider::new(csv(&[row(now, 34.1, -118.2, 5, 2.0)]));
        let result = run(&config, &provider, now).await;

        assert!(matches!(result, Err(PipelineError::Store(_))));
        assert_eq!(std::fs::read(&store).unwrap(), before);
    }
}
