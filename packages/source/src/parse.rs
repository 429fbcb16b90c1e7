//! Parsing of FIRMS area API CSV responses into [`Detection`]s.

use chrono::NaiveDate;
use fire_map_detection_models::{AcqTime, Detection, acquisition_timestamp};
use serde::Deserialize;

use crate::SourceError;

/// Columns without which no acquisition timestamp can be derived.
pub const REQUIRED_COLUMNS: &[&str] = &["acq_date", "acq_time"];

/// One row of the provider CSV, before the timestamp is derived.
#[derive(Debug, Deserialize)]
struct RawHotspot {
    latitude: f64,
    longitude: f64,
    #[serde(default, alias = "brightness")]
    bright_ti4: Option<f64>,
    #[serde(default)]
    scan: Option<f64>,
    #[serde(default)]
    track: Option<f64>,
    acq_date: NaiveDate,
    acq_time: AcqTime,
    #[serde(default)]
    satellite: Option<String>,
    #[serde(default)]
    instrument: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, alias = "bright_t31")]
    bright_ti5: Option<f64>,
    frp: f64,
    #[serde(default)]
    daynight: Option<String>,
}

impl From<RawHotspot> for Detection {
    fn from(raw: RawHotspot) -> Self {
        Self {
            datetime: acquisition_timestamp(raw.acq_date, raw.acq_time),
            latitude: raw.latitude,
            longitude: raw.longitude,
            bright_ti4: raw.bright_ti4,
            scan: raw.scan,
            track: raw.track,
            acq_date: raw.acq_date,
            acq_time: raw.acq_time,
            satellite: raw.satellite,
            instrument: raw.instrument,
            confidence: raw.confidence,
            version: raw.version,
            bright_ti5: raw.bright_ti5,
            frp: raw.frp,
            daynight: raw.daynight,
        }
    }
}

/// Parses a FIRMS CSV body into detections with derived UTC timestamps.
///
/// An empty body (the API returns only a header, or nothing, when there are
/// no detections) yields an empty list. Rows whose fire radiative power is
/// negative or not a finite number are skipped with a warning.
///
/// # Errors
///
/// Returns [`SourceError::MissingFields`] if `acq_date` or `acq_time` is not
/// among the columns, or [`SourceError::Csv`] if a row fails to parse.
pub fn parse_detections(body: &str) -> Result<Vec<Detection>, SourceError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| (*col).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SourceError::MissingFields { missing });
    }

    let mut detections = Vec::new();
    for row in reader.deserialize::<RawHotspot>() {
        let raw = row?;
        if !(raw.frp.is_finite() && raw.frp >= 0.0) {
            log::warn!(
                "Skipping detection at ({}, {}) with invalid FRP {}",
                raw.latitude,
                raw.longitude,
                raw.frp
            );
            continue;
        }
        detections.push(raw.into());
    }

    log::info!("Parsed {} detections from provider CSV", detections.len());
    Ok(detections)
}
