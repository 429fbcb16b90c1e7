//! NASA FIRMS area API and boundary GeoJSON provider.
//!
//! Detections come from the FIRMS area CSV endpoint:
//!
//! ```text
//! {base_url}/{map_key}/{source}/{west,south,east,north}/{day_range}
//! ```
//!
//! The boundary is a single GET against a fully parameterised query URL
//! (e.g. an `ArcGIS` `MapServer/.../query?f=geojson` endpoint).

use std::time::Duration;

use async_trait::async_trait;

use crate::retry::{self, RetryPolicy};
use crate::{BoundingBox, HotspotProvider, SourceError};

/// Default FIRMS area CSV endpoint.
pub const DEFAULT_AREA_BASE_URL: &str = "https://firms.modaps.eosdis.nasa.gov/api/area/csv";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// User-Agent sent with every provider request.
const USER_AGENT: &str = concat!("fire-map/", env!("CARGO_PKG_VERSION"));

/// Everything needed to build a [`FirmsProvider`].
#[derive(Debug, Clone)]
pub struct FirmsOptions {
    /// Area API base URL, without a trailing slash.
    pub base_url: String,
    /// FIRMS map key.
    pub map_key: String,
    /// Sensor source identifier (e.g. `VIIRS_SNPP_NRT`).
    pub source: String,
    pub bbox: BoundingBox,
    /// Lookback in days requested from the API (1-10).
    pub day_range: u8,
    /// Boundary query URL.
    pub boundary_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// [`HotspotProvider`] backed by the FIRMS area API.
pub struct FirmsProvider {
    client: reqwest::Client,
    area_url: String,
    boundary_url: String,
    source: String,
    retry: RetryPolicy,
}

impl FirmsProvider {
    /// Builds a provider with a shared `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidBoundingBox`] if the box is malformed,
    /// or [`SourceError::Http`] if the client cannot be built.
    pub fn new(options: FirmsOptions) -> Result<Self, SourceError> {
        options.bbox.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(retry::http_error)?;

        Ok(Self {
            client,
            area_url: area_url(
                &options.base_url,
                &options.map_key,
                &options.source,
                &options.bbox,
                options.day_range,
            ),
            boundary_url: options.boundary_url,
            source: options.source,
            retry: options.retry,
        })
    }
}

#[async_trait]
impl HotspotProvider for FirmsProvider {
    fn id(&self) -> &str {
        &self.source
    }

    async fn fetch_detections(&self) -> Result<String, SourceError> {
        log::info!("Fetching detections from {}", retry::redact(&self.area_url));
        retry::send_text(|| self.client.get(&self.area_url), self.retry).await
    }

    async fn fetch_boundary(&self) -> Result<Vec<u8>, SourceError> {
        log::info!("Fetching boundary from {}", self.boundary_url);
        retry::send_bytes(|| self.client.get(&self.boundary_url), self.retry).await
    }
}

/// Builds the FIRMS area CSV URL.
#[must_use]
pub fn area_url(
    base_url: &str,
    map_key: &str,
    source: &str,
    bbox: &BoundingBox,
    day_range: u8,
) -> String {
    format!(
        "{}/{map_key}/{source}/{}/{day_range}",
        base_url.trim_end_matches('/'),
        bbox.to_query()
    )
}
