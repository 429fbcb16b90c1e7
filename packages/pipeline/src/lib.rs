#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire map pipeline stages.
//!
//! Each stage reads the files written by the previous one and returns an
//! explicit outcome:
//!
//! 1. [`fetch::run`] downloads detections and the boundary, keeps the
//!    trailing window, snapshots it, and merges it into the store.
//! 2. [`transform::run`] converts the boundary, re-filters the newest store,
//!    and clips it to the boundary.
//! 3. [`render::run`] writes the interactive HTML map.
//! 4. [`publish::run`] uploads the map when a bucket is configured.
//!
//! [`run_all`] chains them. Every stage runs to completion and returns;
//! nothing is long-lived.

pub mod config;
pub mod fetch;
pub mod publish;
pub mod render;
pub mod transform;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use fire_map_source::HotspotProvider;
use fire_map_store::selection as store;

pub use config::{ConfigError, PipelineConfig};

/// Errors that abort a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] fire_map_source::SourceError),

    #[error(transparent)]
    Store(#[from] fire_map_store::StoreError),

    #[error(transparent)]
    Spatial(#[from] fire_map_spatial::SpatialError),

    #[error(transparent)]
    Render(#[from] fire_map_render::RenderError),

    /// I/O error outside the stage crates (directory setup, listings).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input produced by an earlier stage is missing.
    #[error("Missing {what} at {} (run the earlier stages first)", path.display())]
    MissingInput {
        /// Which input.
        what: &'static str,
        /// Where it was expected.
        path: PathBuf,
    },
}

/// Outcomes of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetch: fetch::FetchOutcome,
    /// `None` when no accumulated store exists yet.
    pub transform: Option<transform::TransformOutcome>,
    /// `None` when the transform stage had nothing to render.
    pub render: Option<render::RenderOutcome>,
    pub publish: Option<publish::PublishOutcome>,
}

impl RunSummary {
    const fn fetch_only(fetch: fetch::FetchOutcome) -> Self {
        Self {
            fetch,
            transform: None,
            render: None,
            publish: None,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fetch: {}", self.fetch)?;
        match &self.transform {
            Some(transform) => write!(f, "; transform: {transform}")?,
            None => f.write_str("; transform: no store yet")?,
        }
        if let Some(render) = &self.render {
            write!(f, "; render: {render}")?;
        }
        if let Some(publish) = &self.publish {
            write!(f, "; publish: {publish}")?;
        }
        Ok(())
    }
}

/// Runs fetch, transform, render, and publish in order.
///
/// A failed detection download or an unusable provider CSV is recorded as
/// [`fetch::FetchOutcome::Failed`] and the run continues from the existing
/// store. A fetch with no recent detections does not stop the run either,
/// since the store may still hold detections inside the transform window.
/// When no store exists yet the run ends after fetch. A transform with no
/// recent detections skips render and publish, leaving the previous map in
/// place.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by transform or render, or a
/// non-provider error from fetch (directory setup, store merge). Publish
/// failures are reported in the summary instead.
pub async fn run_all(
    config: &PipelineConfig,
    provider: &dyn HotspotProvider,
    now: DateTime<Utc>,
) -> Result<RunSummary, PipelineError> {
    let fetch = match fetch::run(config, provider, now).await {
        Ok(outcome) => outcome,
        Err(PipelineError::Source(e)) => {
            log::warn!("Fetch failed, continuing with the existing store: {e}");
            fetch::FetchOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(e) => return Err(e),
    };

    let paths = config.data_paths();
    if !matches!(fetch, fetch::FetchOutcome::Merged { .. })
        && store::latest_store(&paths.raw_dir(), &paths.store_prefix())?.is_none()
    {
        log::info!("No accumulated store yet, nothing to transform");
        return Ok(RunSummary::fetch_only(fetch));
    }

    let transform = transform::run(config, now)?;

    if matches!(transform, transform::TransformOutcome::NoRecentDetections { .. }) {
        log::info!("Nothing inside the window, skipping render and publish");
        return Ok(RunSummary {
            transform: Some(transform),
            ..RunSummary::fetch_only(fetch)
        });
    }

    let render = render::run(config)?;
    let publish = publish::run(config).await;

    Ok(RunSummary {
        fetch,
        transform: Some(transform),
        render: Some(render),
        publish: Some(publish),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use fire_map_source::{HotspotProvider, SourceError};

    use crate::config::PipelineConfig;

    pub const HEADER: &str = "latitude,longitude,bright_ti4,scan,track,acq_date,acq_time,\
                              satellite,instrument,confidence,version,bright_ti5,frp,daynight";

    pub const BOUNDARY: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "NAME": "Test County" },
            "geometry": { "type": "Polygon", "coordinates": [[
                [-118.9, 33.7], [-117.6, 33.7], [-117.6, 34.8], [-118.9, 34.8], [-118.9, 33.7]
            ]] }
        }]
    }"#;

    /// Provider serving canned responses.
    pub struct FakeProvider {
        pub detections: Result<String, u16>,
        pub boundary: Result<Vec<u8>, u16>,
    }

    impl FakeProvider {
        pub fn new(detections: String) -> Self {
            Self {
                detections: Ok(detections),
                boundary: Ok(BOUNDARY.as_bytes().to_vec()),
            }
        }
    }

    fn status(status: u16) -> SourceError {
        SourceError::Status {
            url: "https://example.test".to_string(),
            status,
        }
    }

    #[async_trait]
    impl HotspotProvider for FakeProvider {
        fn id(&self) -> &str {
            "fake"
        }

        async fn fetch_detections(&self) -> Result<String, SourceError> {
            self.detections.clone().map_err(status)
        }

        async fn fetch_boundary(&self) -> Result<Vec<u8>, SourceError> {
            self.boundary.clone().map_err(status)
        }
    }

    /// One CSV row acquired `minutes_ago` before `now`.
    pub fn row(now: DateTime<Utc>, lat: f64, lon: f64, minutes_ago: i64, frp: f64) -> String {
        let at = now - Duration::minutes(minutes_ago);
        format!(
            "{lat},{lon},330.1,0.39,0.36,{},{},N,VIIRS,n,2.0NRT,290.2,{frp},D",
            at.format("%Y-%m-%d"),
            at.format("%H%M")
        )
    }

    pub fn csv(rows: &[String]) -> String {
        let mut body = HEADER.to_string();
        for r in rows {
            body.push('\n');
            body.push_str(r);
        }
        body.push('\n');
        body
    }

    /// The embedded config pointed at `data_dir`, with a map key and the
    /// map written inside `data_dir`.
    pub fn config(data_dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::embedded().unwrap();
        config.paths.data_dir = data_dir.to_path_buf();
        config.render.output = data_dir.join("map.html");
        config.map_key = Some("test-key".to_string());
        config
    }

    /// A fixed `now` on a whole minute, so packed times round-trip exactly.
    pub fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-08T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }
}
