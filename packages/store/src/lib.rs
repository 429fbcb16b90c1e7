#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accumulated detection store.
//!
//! The store is a CSV file holding every detection ever fetched, keyed by
//! (latitude, longitude, timestamp). It is the only persistent state of the
//! pipeline. [`merge_into`] loads it, appends a new batch, removes
//! duplicates, and atomically rewrites it. A store that fails to parse is
//! never overwritten.

pub mod atomic;
pub mod paths;
pub mod selection;

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fire_map_detection_models::{Detection, dedupe};

use crate::paths::DataPaths;

/// Errors that can occur while reading or writing detection files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The existing file could not be parsed.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error reading or writing local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts produced by a merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Rows in the store before the merge (0 if it did not exist).
    pub existing: usize,
    /// Rows in the incoming batch.
    pub incoming: usize,
    /// Rows written after deduplication.
    pub written: usize,
}

impl MergeReport {
    /// Number of incoming rows that were new to the store.
    #[must_use]
    pub const fn added(&self) -> usize {
        self.written.saturating_sub(self.existing)
    }
}

impl std::fmt::Display for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} existing + {} incoming -> {} rows ({} new)",
            self.existing,
            self.incoming,
            self.written,
            self.added()
        )
    }
}

/// Parses detections from CSV with a header row.
///
/// # Errors
///
/// Returns a CSV error on malformed rows or missing required columns.
pub fn read_detections<R: Read>(reader: R) -> Result<Vec<Detection>, csv::Error> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .collect()
}

/// Loads all detections from a store or snapshot file.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be opened and
/// [`StoreError::Parse`] if any row fails to parse.
pub fn load(path: &Path) -> Result<Vec<Detection>, StoreError> {
    let file = std::fs::File::open(path)?;
    read_detections(std::io::BufReader::new(file)).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically writes detections as CSV to `path`.
///
/// # Errors
///
/// Returns an error if serialization or the atomic replace fails.
pub fn write_detections(path: &Path, detections: &[Detection]) -> Result<(), StoreError> {
    atomic::write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        for detection in detections {
            writer.serialize(detection)?;
        }
        writer.flush()?;
        Ok::<_, StoreError>(())
    })
}

/// Merges `incoming` into the store at `path`.
///
/// Existing rows come first, so on a key collision the stored instance is
/// kept. Merging the same batch twice leaves the store unchanged.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] without touching the file if the existing
/// store cannot be parsed, or an I/O/CSV error if the rewrite fails.
pub fn merge_into(path: &Path, incoming: Vec<Detection>) -> Result<MergeReport, StoreError> {
    let existing = if path.exists() {
        let rows = load(path)?;
        log::info!("Loaded {} rows from {}", rows.len(), path.display());
        rows
    } else {
        log::info!("No store at {}, creating it", path.display());
        Vec::new()
    };

    let existing_len = existing.len();
    let incoming_len = incoming.len();
    let merged = dedupe(existing.into_iter().chain(incoming));

    write_detections(path, &merged)?;

    let report = MergeReport {
        existing: existing_len,
        incoming: incoming_len,
        written: merged.len(),
    };
    log::info!("Updated store {}: {report}", path.display());
    Ok(report)
}

/// Writes the timestamped snapshot of a fetch and returns its path.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be written.
pub fn write_snapshot(
    paths: &DataPaths,
    at: DateTime<Utc>,
    detections: &[Detection],
) -> Result<PathBuf, StoreError> {
    let path = paths.snapshot(at);
    write_detections(&path, detections)?;
    log::info!(
        "Saved {} recent detections to {}",
        detections.len(),
        path.display()
    );
    Ok(path)
}
