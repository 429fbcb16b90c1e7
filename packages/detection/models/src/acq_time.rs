//! Packed `HHMM` acquisition time as delivered by the FIRMS API.
//!
//! The provider emits the time of day as an unpadded integer (`5` means
//! 00:05, `930` means 09:30). [`AcqTime`] zero-pads to four digits on parse
//! and always serializes back to the padded form.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when a packed acquisition time cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid acquisition time '{value}': {reason}")]
pub struct InvalidAcqTimeError {
    /// The raw value that failed to parse.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Acquisition time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcqTime {
    hour: u8,
    minute: u8,
}

impl AcqTime {
    /// Creates a time from hour and minute components.
    ///
    /// # Errors
    ///
    /// Returns an error if `hour > 23` or `minute > 59`.
    pub fn new(hour: u8, minute: u8) -> Result<Self, InvalidAcqTimeError> {
        if hour > 23 {
            return Err(InvalidAcqTimeError {
                value: format!("{hour:02}{minute:02}"),
                reason: "hour out of range",
            });
        }
        if minute > 59 {
            return Err(InvalidAcqTimeError {
                value: format!("{hour:02}{minute:02}"),
                reason: "minute out of range",
            });
        }
        Ok(Self { hour, minute })
    }

    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Returns the packed, zero-padded `HHMM` form (e.g. `"0005"`).
    #[must_use]
    pub fn packed(self) -> String {
        format!("{:02}{:02}", self.hour, self.minute)
    }

    /// Formats as `HH:MM:SS` for display (seconds are always `00`).
    #[must_use]
    pub fn to_hms(self) -> String {
        format!("{:02}:{:02}:00", self.hour, self.minute)
    }

    /// Converts to a [`NaiveTime`].
    #[must_use]
    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for AcqTime {
    type Err = InvalidAcqTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // pandas round-trips can leave a trailing ".0"
        let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);

        if trimmed.is_empty() || trimmed.len() > 4 || !trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidAcqTimeError {
                value: s.to_string(),
                reason: "expected 1-4 digits",
            });
        }

        let padded = format!("{trimmed:0>4}");
        let hour: u8 = padded[..2].parse().map_err(|_| InvalidAcqTimeError {
            value: s.to_string(),
            reason: "expected 1-4 digits",
        })?;
        let minute: u8 = padded[2..].parse().map_err(|_| InvalidAcqTimeError {
            value: s.to_string(),
            reason: "expected 1-4 digits",
        })?;

        Self::new(hour, minute).map_err(|e| InvalidAcqTimeError {
            value: s.to_string(),
            reason: e.reason,
        })
    }
}

impl fmt::Display for AcqTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.hour, self.minute)
    }
}

impl Serialize for AcqTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.packed())
    }
}

impl<'de> Deserialize<'de> for AcqTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = AcqTime;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a packed HHMM time as a string or integer")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<AcqTime, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<AcqTime, E> {
                v.to_string().parse().map_err(E::custom)
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<AcqTime, E> {
                v.to_string().parse().map_err(E::custom)
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<AcqTime, E> {
                if v.fract() != 0.0 || !(0.0..10_000.0).contains(&v) {
                    return Err(E::custom(format!("invalid acquisition time '{v}'")));
                }
                (v as u64).to_string().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Formats a raw provider time value as `HH:MM:SS`, zero-padding to four
/// digits first.
///
/// # Errors
///
/// Returns an error if the value is not a valid packed time.
pub fn format_acq_time(raw: &str) -> Result<String, InvalidAcqTimeError> {
    raw.parse::<AcqTime>().map(AcqTime::to_hms)
}
