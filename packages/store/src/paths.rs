#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the pipeline's data directory.
//!
//! Every stage locates its inputs and outputs through [`DataPaths`]; the file
//! names below are the contract between stages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// File name prefix of the accumulated store (region slug is appended).
pub const STORE_PREFIX: &str = "Cumulative_FireData_";

/// File name prefix of per-run detection snapshots.
pub const SNAPSHOT_PREFIX: &str = "VIIRS_FireData_";

/// Resolves every pipeline file from a data directory and region slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    data_dir: PathBuf,
    region: String,
}

impl DataPaths {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            region: region.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the `raw/` directory for fetched data and the store.
    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Returns the `processed/` directory for derived vector files.
    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// Raw boundary document exactly as returned by the provider.
    #[must_use]
    pub fn raw_boundary(&self) -> PathBuf {
        self.raw_dir().join(format!("{}_Boundary.geojson", self.region))
    }

    /// Boundary converted to the indexed vector format.
    #[must_use]
    pub fn processed_boundary(&self) -> PathBuf {
        self.processed_dir()
            .join(format!("{}_Boundary.geojson", self.region))
    }

    /// Name prefix shared by every accumulated store file for this region.
    #[must_use]
    pub fn store_prefix(&self) -> String {
        format!("{STORE_PREFIX}{}", self.region)
    }

    /// Canonical accumulated store path.
    #[must_use]
    pub fn accumulated_store(&self) -> PathBuf {
        self.raw_dir().join(format!("{}.csv", self.store_prefix()))
    }

    /// Timestamped snapshot path for a fetch that ran at `at`.
    #[must_use]
    pub fn snapshot(&self, at: DateTime<Utc>) -> PathBuf {
        self.raw_dir().join(format!(
            "{SNAPSHOT_PREFIX}{}_{}.csv",
            self.region,
            at.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Clipped detection set, overwritten on every transform.
    #[must_use]
    pub fn clipped_detections(&self) -> PathBuf {
        self.processed_dir()
            .join(format!("{SNAPSHOT_PREFIX}{}.geojson", self.region))
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
