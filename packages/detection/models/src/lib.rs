#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Active-fire detection types shared across the fire map pipeline.
//!
//! A [`Detection`] is one VIIRS thermal anomaly with its derived UTC
//! acquisition timestamp. The triple (latitude, longitude, timestamp) is the
//! identity of a detection: [`DetectionKey`] captures it and [`dedupe`]
//! keeps the first instance of each key. [`TimeWindow`] implements the
//! trailing-window filter applied by both the fetch and transform stages.

pub mod acq_time;
pub mod tier;

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use acq_time::{AcqTime, InvalidAcqTimeError, format_acq_time};
pub use tier::{IntensityThresholds, IntensityTier, MarkerStyle};

/// One satellite-observed thermal anomaly.
///
/// Field order matches the FIRMS VIIRS CSV layout with the derived
/// `datetime` column appended, which is also the accumulated store layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub latitude: f64,
    pub longitude: f64,
    /// I-4 channel brightness temperature (Kelvin).
    #[serde(default, alias = "brightness")]
    pub bright_ti4: Option<f64>,
    #[serde(default)]
    pub scan: Option<f64>,
    #[serde(default)]
    pub track: Option<f64>,
    pub acq_date: NaiveDate,
    pub acq_time: AcqTime,
    #[serde(default)]
    pub satellite: Option<String>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// I-5 channel brightness temperature (Kelvin).
    #[serde(default, alias = "bright_t31")]
    pub bright_ti5: Option<f64>,
    /// Fire radiative power (MW).
    pub frp: f64,
    #[serde(default)]
    pub daynight: Option<String>,
    /// Acquisition timestamp derived from `acq_date` + `acq_time`.
    #[serde(with = "timestamp")]
    pub datetime: DateTime<Utc>,
}

impl Detection {
    /// Returns the uniqueness key of this detection.
    #[must_use]
    pub fn key(&self) -> DetectionKey {
        DetectionKey::new(self.latitude, self.longitude, self.datetime)
    }

    /// Classifies this detection's fire radiative power.
    #[must_use]
    pub fn tier(&self, thresholds: IntensityThresholds) -> IntensityTier {
        IntensityTier::classify(self.frp, thresholds)
    }
}

/// Combines an acquisition date and packed time into a UTC timestamp.
#[must_use]
pub fn acquisition_timestamp(date: NaiveDate, time: AcqTime) -> DateTime<Utc> {
    date.and_time(time.to_naive_time()).and_utc()
}

/// Identity of a detection: (latitude, longitude, timestamp).
///
/// Coordinates are compared by exact bit pattern (with `-0.0` folded onto
/// `0.0`), which is stable because the store round-trips `f64` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetectionKey {
    latitude_bits: u64,
    longitude_bits: u64,
    timestamp: i64,
}

impl DetectionKey {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, datetime: DateTime<Utc>) -> Self {
        Self {
            latitude_bits: canonical_bits(latitude),
            longitude_bits: canonical_bits(longitude),
            timestamp: datetime.timestamp(),
        }
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
}

/// Removes duplicate detections by [`DetectionKey`], keeping the first
/// instance of each key and preserving input order.
#[must_use]
pub fn dedupe(detections: impl IntoIterator<Item = Detection>) -> Vec<Detection> {
    let mut seen = BTreeSet::new();
    detections
        .into_iter()
        .filter(|d| seen.insert(d.key()))
        .collect()
}

/// A trailing time window `[now - length, now]`, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Builds the window ending at `now` and spanning `hours`.
    #[must_use]
    pub fn trailing(now: DateTime<Utc>, hours: u32) -> Self {
        Self {
            start: now - chrono::Duration::hours(i64::from(hours)),
            end: now,
        }
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Keeps only the detections whose timestamp falls inside the window.
    #[must_use]
    pub fn retain(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|d| self.contains(d.datetime))
            .collect()
    }
}

/// Serde adapter for the persisted `datetime` column.
///
/// Writes RFC 3339 with a `Z` suffix. Reads RFC 3339 as well as the
/// space-separated `YYYY-MM-DD HH:MM:SS[+00:00]` form written by earlier
/// revisions of the store.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp as RFC 3339.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Deserializes a timestamp in any accepted format.
    ///
    /// # Errors
    ///
    /// Returns an error if the value matches none of the accepted formats.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    /// Parses a persisted timestamp.
    #[must_use]
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
