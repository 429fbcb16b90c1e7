#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Active-fire data providers.
//!
//! A provider implements [`HotspotProvider`] to fetch the raw detection CSV
//! and the raw boundary document. [`parse::parse_detections`] turns the CSV
//! into [`fire_map_detection_models::Detection`]s. The FIRMS implementation
//! lives in [`firms`].

pub mod firms;
pub mod parse;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use parse::parse_detections;

/// Errors that can occur while fetching or parsing provider data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP transport failure. Built through [`retry::http_error`], which
    /// strips the request URL.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// The provider answered with a status other than 200.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Request URL (secrets redacted).
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Required columns are absent from the provider CSV.
    #[error("Required fields missing from provider data: {}", missing.join(", "))]
    MissingFields {
        /// Names of the absent columns.
        missing: Vec<String>,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The configured bounding box is malformed.
    #[error("Invalid bounding box: {message}")]
    InvalidBoundingBox {
        /// Description of what is wrong.
        message: String,
    },
}

/// Geographic query box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Checks ranges and ordering.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBoundingBox`] if a coordinate is out of
    /// range or a minimum is not below its maximum.
    pub fn validate(&self) -> Result<(), SourceError> {
        let invalid = |message: String| Err(SourceError::InvalidBoundingBox { message });

        for (name, lon) in [("min_lon", self.min_lon), ("max_lon", self.max_lon)] {
            if !(-180.0..=180.0).contains(&lon) {
                return invalid(format!("{name} {lon} outside [-180, 180]"));
            }
        }
        for (name, lat) in [("min_lat", self.min_lat), ("max_lat", self.max_lat)] {
            if !(-90.0..=90.0).contains(&lat) {
                return invalid(format!("{name} {lat} outside [-90, 90]"));
            }
        }
        if self.min_lon >= self.max_lon {
            return invalid(format!(
                "min_lon {} must be less than max_lon {}",
                self.min_lon, self.max_lon
            ));
        }
        if self.min_lat >= self.max_lat {
            return invalid(format!(
                "min_lat {} must be less than max_lat {}",
                self.min_lat, self.max_lat
            ));
        }
        Ok(())
    }

    /// Formats as the `west,south,east,north` query segment.
    #[must_use]
    pub fn to_query(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Trait that all detection/boundary providers implement.
///
/// Each call issues one logical request; implementations decide their own
/// retry behaviour.
#[async_trait]
pub trait HotspotProvider: Send + Sync {
    /// Returns an identifier for log output (e.g. the sensor source).
    fn id(&self) -> &str;

    /// Downloads the raw detection CSV body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure or a non-200 status.
    async fn fetch_detections(&self) -> Result<String, SourceError>;

    /// Downloads the raw boundary document bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure or a non-200 status.
    async fn fetch_boundary(&self) -> Result<Vec<u8>, SourceError>;
}
