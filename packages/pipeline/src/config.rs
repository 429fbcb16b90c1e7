//! Pipeline configuration.
//!
//! The configuration is a TOML document. A default is embedded at compile
//! time via [`include_str!`]; a file passed with `--config` (or named by
//! `FIRE_MAP_CONFIG`) replaces it. Deployment values and secrets are read
//! from the environment and never from the file:
//!
//! | Variable | Description |
//! |---|---|
//! | `FIRMS_MAP_KEY` | FIRMS API map key (required by the fetch stage) |
//! | `FIRE_MAP_BUCKET` | Publish bucket (publishing is skipped when unset) |
//! | `FIRE_MAP_DATA_DIR` | Overrides `paths.data_dir` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use fire_map_detection_models::IntensityThresholds;
use fire_map_publish::PublishTarget;
use fire_map_render::RenderOptions;
use fire_map_source::BoundingBox;
use fire_map_source::firms::FirmsOptions;
use fire_map_source::retry::RetryPolicy;
use fire_map_store::paths::DataPaths;
use serde::Deserialize;

/// Embedded default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

pub const MAP_KEY_ENV: &str = "FIRMS_MAP_KEY";
pub const BUCKET_ENV: &str = "FIRE_MAP_BUCKET";
pub const DATA_DIR_ENV: &str = "FIRE_MAP_DATA_DIR";
pub const CONFIG_ENV: &str = "FIRE_MAP_CONFIG";

/// Longest trailing window accepted, one leap year.
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has the wrong shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of what is wrong.
        message: String,
    },

    /// A required environment variable is not set.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing variable.
        name: String,
    },
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Region slug used in every file name (e.g. `"LACo"`).
    pub region: String,
    pub fetch: FetchConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    /// FIRMS map key, from `FIRMS_MAP_KEY` only.
    #[serde(skip)]
    pub map_key: Option<String>,
}

/// Detection and boundary retrieval.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// FIRMS sensor source (e.g. `"VIIRS_SNPP_NRT"`).
    pub source: String,
    pub bbox: BoundingBox,
    /// Days of data requested from the API (1-10).
    #[serde(default = "default_day_range")]
    pub day_range: u8,
    /// Trailing window applied to freshly fetched detections.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub boundary_url: String,
}

/// HTTP client behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of the `raw/` and `processed/` directories.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    /// Trailing window re-applied to the accumulated store before clipping.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
        }
    }
}

/// Map presentation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// `[latitude, longitude]`.
    #[serde(default = "default_center")]
    pub center: [f64; 2],
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Where the HTML document is written.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            center: default_center(),
            zoom: default_zoom(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            output: default_output(),
        }
    }
}

/// Object storage destination. Publishing is disabled without a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_publish_key")]
    pub key: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            key: default_publish_key(),
            endpoint_url: None,
            region: None,
        }
    }
}

const fn default_day_range() -> u8 {
    1
}

const fn default_window_hours() -> u32 {
    24
}

fn default_base_url() -> String {
    fire_map_source::firms::DEFAULT_AREA_BASE_URL.to_string()
}

const fn default_max_retries() -> u32 {
    fire_map_source::retry::DEFAULT_MAX_RETRIES
}

const fn default_timeout_secs() -> u64 {
    fire_map_source::firms::DEFAULT_TIMEOUT.as_secs()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_title() -> String {
    RenderOptions::default().title
}

const fn default_center() -> [f64; 2] {
    fire_map_render::DEFAULT_CENTER
}

const fn default_zoom() -> u8 {
    fire_map_render::DEFAULT_ZOOM
}

const fn default_high_threshold() -> f64 {
    fire_map_detection_models::tier::DEFAULT_HIGH_THRESHOLD
}

const fn default_medium_threshold() -> f64 {
    fire_map_detection_models::tier::DEFAULT_MEDIUM_THRESHOLD
}

fn default_output() -> PathBuf {
    PathBuf::from("fire_interactive_map.html")
}

fn default_publish_key() -> String {
    "fire_interactive_map.html".to_string()
}

impl PipelineConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the embedded document is malformed.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Loads the file at `path`, or the embedded default when `None`, then
    /// applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or the
    /// result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::embedded()?,
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(MAP_KEY_ENV) {
            self.map_key = Some(key);
        }
        if let Some(bucket) = lookup(BUCKET_ENV) {
            self.publish.bucket = Some(bucket);
        }
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.paths.data_dir = PathBuf::from(dir);
        }
    }

    /// Checks ranges and consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.region.is_empty()
            || !self
                .region
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return invalid(format!(
                "region '{}' must be a non-empty slug of letters, digits, '_' or '-'",
                self.region
            ));
        }
        if let Err(e) = self.fetch.bbox.validate() {
            return invalid(e.to_string());
        }
        if !(1..=10).contains(&self.fetch.day_range) {
            return invalid(format!(
                "fetch.day_range {} outside 1..=10",
                self.fetch.day_range
            ));
        }
        for (name, hours) in [
            ("fetch.window_hours", self.fetch.window_hours),
            ("transform.window_hours", self.transform.window_hours),
        ] {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                return invalid(format!("{name} {hours} outside 1..={MAX_WINDOW_HOURS}"));
            }
        }
        if self.fetch.source.is_empty() {
            return invalid("fetch.source must not be empty".to_string());
        }
        if self.http.timeout_secs == 0 {
            return invalid("http.timeout_secs must be positive".to_string());
        }
        let thresholds = [self.render.medium_threshold, self.render.high_threshold];
        if !thresholds.iter().all(|t| t.is_finite() && *t >= 0.0) {
            return invalid("render thresholds must be finite and non-negative".to_string());
        }
        let [lat, lon] = self.render.center;
        if !((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)) {
            return invalid(format!("render.center [{lat}, {lon}] is not a valid position"));
        }
        if self.render.medium_threshold >= self.render.high_threshold {
            return invalid(format!(
                "render.medium_threshold {} must be below render.high_threshold {}",
                self.render.medium_threshold, self.render.high_threshold
            ));
        }
        if self.render.zoom > 20 {
            return invalid(format!("render.zoom {} outside 0..=20", self.render.zoom));
        }
        if self.publish.bucket.is_some() && self.publish.key.trim().is_empty() {
            return invalid("publish.key must not be empty when a bucket is set".to_string());
        }
        Ok(())
    }

    /// Canonical file locations for this region.
    #[must_use]
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(&self.paths.data_dir, &self.region)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.http.max_retries,
            base_delay: Duration::from_secs(2),
        }
    }

    /// Provider options for the FIRMS client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if no map key was supplied.
    pub fn firms_options(&self) -> Result<FirmsOptions, ConfigError> {
        let map_key = self.map_key.clone().ok_or_else(|| ConfigError::MissingEnv {
            name: MAP_KEY_ENV.to_string(),
        })?;

        Ok(FirmsOptions {
            base_url: self.fetch.base_url.clone(),
            map_key,
            source: self.fetch.source.clone(),
            bbox: self.fetch.bbox,
            day_range: self.fetch.day_range,
            boundary_url: self.fetch.boundary_url.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            retry: self.retry_policy(),
        })
    }

    #[must_use]
    pub const fn thresholds(&self) -> IntensityThresholds {
        IntensityThresholds {
            high: self.render.high_threshold,
            medium: self.render.medium_threshold,
        }
    }

    #[must_use]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            title: self.render.title.clone(),
            center: self.render.center,
            zoom: self.render.zoom,
            thresholds: self.thresholds(),
            boundary_name: format!("{} Boundary", self.region),
        }
    }

    /// Publish destination, or `None` when no bucket is configured.
    #[must_use]
    pub fn publish_target(&self) -> Option<PublishTarget> {
        self.publish.bucket.as_ref().map(|bucket| PublishTarget {
            bucket: bucket.clone(),
            key: self.publish.key.clone(),
            endpoint_url: self.publish.endpoint_url.clone(),
            region: self.publish.region.clone(),
        })
    }
}
