//! Fire radiative power intensity tiers and their marker styles.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default FRP above which a detection is high intensity.
pub const DEFAULT_HIGH_THRESHOLD: f64 = 3.0;

/// Default FRP above which a detection is medium intensity.
pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 1.5;

/// The two FRP cut points separating the three tiers.
///
/// A value equal to a threshold belongs to the lower tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityThresholds {
    /// High/medium boundary.
    pub high: f64,
    /// Medium/low boundary.
    pub medium: f64,
}

impl Default for IntensityThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            medium: DEFAULT_MEDIUM_THRESHOLD,
        }
    }
}

/// Intensity classification of a detection by fire radiative power.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IntensityTier {
    Low,
    Medium,
    High,
}

/// Visual style for a detection marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerStyle {
    /// Stroke and fill color (CSS hex).
    pub color: &'static str,
    /// Circle radius in pixels.
    pub radius: u8,
    pub fill_opacity: f64,
}

impl IntensityTier {
    /// All tiers from most to least intense (legend order).
    pub const DESCENDING: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Classifies a fire radiative power value.
    #[must_use]
    pub fn classify(frp: f64, thresholds: IntensityThresholds) -> Self {
        if frp > thresholds.high {
            Self::High
        } else if frp > thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Marker style for this tier. Higher intensity is larger and more
    /// saturated.
    #[must_use]
    pub const fn style(self) -> MarkerStyle {
        match self {
            Self::High => MarkerStyle {
                color: "#d73027",
                radius: 10,
                fill_opacity: 0.8,
            },
            Self::Medium => MarkerStyle {
                color: "#fc8d59",
                radius: 8,
                fill_opacity: 0.6,
            },
            Self::Low => MarkerStyle {
                color: "#fee08b",
                radius: 6,
                fill_opacity: 0.5,
            },
        }
    }

    /// Human-readable label used in the map legend.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High Intensity",
            Self::Medium => "Medium Intensity",
            Self::Low => "Low Intensity",
        }
    }

    /// Describes the FRP range covered by this tier, e.g. `"1.5 - 3 FRP"`.
    #[must_use]
    pub fn range_label(self, thresholds: IntensityThresholds) -> String {
        match self {
            Self::High => format!("> {} FRP", thresholds.high),
            Self::Medium => format!("{} - {} FRP", thresholds.medium, thresholds.high),
            Self::Low => format!("0 - {} FRP", thresholds.medium),
        }
    }
}
