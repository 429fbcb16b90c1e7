#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary handling and spatial clipping.
//!
//! [`boundary`] converts the raw boundary `GeoJSON` into the indexed form
//! kept under `processed/`. [`crs`] resolves the boundary's coordinate
//! system through GDAL and reprojects points into it. [`clip`] builds an R-tree over the
//! boundary polygons, filters detections against it, and persists the
//! clipped set.

pub mod boundary;
pub mod clip;
pub mod crs;

pub use boundary::{Boundary, convert_boundary, convert_boundary_file};
pub use clip::{BoundaryIndex, ClippedDetection, ClippedSet};
pub use crs::{Crs, Transformer};

/// Errors that can occur while converting boundaries or clipping.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// I/O error reading or writing local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is JSON but not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document declares a coordinate system we cannot reproject.
    #[error("Unsupported coordinate reference system: {name}")]
    UnsupportedCrs {
        /// The CRS name as declared.
        name: String,
    },

    /// GDAL could not resolve a system or build a transformation.
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    /// A coordinate has no finite position in the target system.
    #[error("Cannot reproject ({x}, {y}) from {from} to {to}")]
    Reprojection {
        from: String,
        to: String,
        x: f64,
        y: f64,
    },

    /// The boundary contains no polygon or multipolygon geometry.
    #[error("Boundary contains no polygons")]
    NoPolygons,

    /// A feature of a clipped set is malformed.
    #[error("Invalid feature {index}: {message}")]
    InvalidFeature {
        /// Zero-based feature position.
        index: usize,
        /// What is wrong with it.
        message: String,
    },
}
