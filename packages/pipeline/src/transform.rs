//! Transform stage: convert the boundary, re-window the store, and clip.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use fire_map_detection_models::TimeWindow;
use fire_map_spatial::{Boundary, BoundaryIndex, ClippedSet, convert_boundary_file};
use fire_map_store::selection::latest_store;

use crate::PipelineError;
use crate::config::PipelineConfig;

/// Result of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// The store holds nothing inside the window; the previous clipped set
    /// was left as is.
    NoRecentDetections { store: PathBuf, total: usize },
    /// The clipped set was rewritten.
    Clipped {
        /// Store file the detections were read from.
        store: PathBuf,
        total: usize,
        /// Rows inside the trailing window.
        recent: usize,
        /// Rows inside the window and the boundary.
        kept: usize,
        path: PathBuf,
    },
}

impl std::fmt::Display for TransformOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecentDetections { total, .. } => {
                write!(f, "no recent detections among {total} stored")
            }
            Self::Clipped {
                total, recent, kept, ..
            } => write!(f, "{kept} of {recent} recent detections inside boundary ({total} stored)"),
        }
    }
}

/// Converts the raw boundary, falling back to the previously converted one
/// when no raw download exists.
fn prepare_boundary(config: &PipelineConfig) -> Result<Boundary, PipelineError> {
    let paths = config.data_paths();
    let raw = paths.raw_boundary();
    let processed = paths.processed_boundary();

    if raw.exists() {
        return Ok(convert_boundary_file(&raw, &processed)?);
    }
    if processed.exists() {
        log::warn!(
            "No raw boundary at {}, reusing {}",
            raw.display(),
            processed.display()
        );
        return Ok(Boundary::load(&processed)?);
    }
    Err(PipelineError::MissingInput {
        what: "boundary",
        path: raw,
    })
}

/// Runs the transform stage with `now` as the window end.
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] if there is no boundary or no
/// accumulated store, [`PipelineError::Spatial`] if the boundary cannot be
/// converted, has no polygons, or declares a system GDAL cannot project
/// into, and [`PipelineError::Store`] if the store cannot be read.
pub fn run(config: &PipelineConfig, now: DateTime<Utc>) -> Result<TransformOutcome, PipelineError> {
    let paths = config.data_paths();
    let boundary = prepare_boundary(config)?;

    let store = latest_store(&paths.raw_dir(), &paths.store_prefix())?.ok_or_else(|| {
        PipelineError::MissingInput {
            what: "accumulated store",
            path: paths.accumulated_store(),
        }
    })?;
    log::info!("Transforming {}", store.display());

    let detections = fire_map_store::load(&store)?;
    let total = detections.len();
    let recent = TimeWindow::trailing(now, config.transform.window_hours).retain(detections);

    if recent.is_empty() {
        log::info!(
            "None of {total} stored detections fall in the last {} hours",
            config.transform.window_hours
        );
        return Ok(TransformOutcome::NoRecentDetections { store, total });
    }
    let recent_count = recent.len();

    let index = BoundaryIndex::new(&boundary)?;
    let clipped = ClippedSet {
        crs: index.crs().clone(),
        detections: index.clip(recent),
    };
    let path = paths.clipped_detections();
    clipped.write(&path)?;

    log::info!(
        "Saved {} clipped detections to {}",
        clipped.detections.len(),
        path.display()
    );
    Ok(TransformOutcome::Clipped {
        store,
        total,
        recent: recent_count,
        kept: clipped.detections.len(),
        path,
    })
}
