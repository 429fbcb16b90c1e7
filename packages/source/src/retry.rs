//! HTTP retry helpers for transient errors.
//!
//! Provider requests go through [`send_text`] or [`send_bytes`] instead of
//! calling `reqwest::RequestBuilder::send()` directly, so every request gets
//! bounded retry with exponential backoff on transient failures (timeouts,
//! connection resets, server errors, rate limiting).
//!
//! Only HTTP 200 is treated as success. Other 2xx/3xx statuses and 4xx
//! statuses (except 429) fail immediately without retrying.

use std::time::Duration;

use crate::SourceError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry behaviour for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): 2s, 4s, 8s, ...
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Sends an HTTP request and returns the response body as a `String`.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server answers with anything other than HTTP 200, or the body cannot be
/// read.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F, policy: RetryPolicy) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, policy).await?;
    let url = response.url().to_string();
    let text = response.text().await.map_err(http_error)?;
    log::debug!("Received {} bytes from {}", text.len(), redact(&url));
    Ok(text)
}

/// Sends an HTTP request and returns the raw response body.
///
/// Behaves identically to [`send_text`] but does not decode the body.
///
/// # Errors
///
/// Same as [`send_text`].
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F, policy: RetryPolicy) -> Result<Vec<u8>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, policy).await?;
    let url = response.url().to_string();
    let bytes = response.bytes().await.map_err(http_error)?;
    log::debug!("Received {} bytes from {}", bytes.len(), redact(&url));
    Ok(bytes.to_vec())
}

/// Core retry loop shared by [`send_text`] and [`send_bytes`].
///
/// Returns the response only when its status is exactly 200.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, policy: RetryPolicy) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                let e = e.without_url();
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::OK {
                    return Ok(response);
                }

                let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error();
                if retryable && attempt < max_retries {
                    log::warn!("  HTTP {status}");
                    attempt += 1;
                    continue;
                }

                return Err(SourceError::Status {
                    url: redact(response.url().as_str()),
                    status: status.as_u16(),
                });
            }
        }
    }
}

/// Wraps a `reqwest` error with its URL removed, since the FIRMS area URL
/// carries the map key.
#[must_use]
pub fn http_error(e: reqwest::Error) -> SourceError {
    SourceError::Http(e.without_url())
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

/// Masks the FIRMS map key segment of an area API URL for logging.
///
/// The key is the path segment following `/csv/`.
#[must_use]
pub fn redact(url: &str) -> String {
    let Some(idx) = url.find("/csv/") else {
        return url.to_string();
    };
    let key_start = idx + "/csv/".len();
    let key_end = url[key_start..]
        .find('/')
        .map_or(url.len(), |offset| key_start + offset);
    format!("{}***{}", &url[..key_start], &url[key_end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn none_policy_never_waits() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
        assert_eq!(RetryPolicy::none().delay_for(1), Duration::ZERO);
    }

    #[test]
    fn redacts_map_key() {
        let url = "https://firms.modaps.eosdis.nasa.gov/api/area/csv/SECRETKEY/VIIRS_SNPP_NRT/-118.9,33.7,-117.6,34.8/1";
        assert_eq!(
            redact(url),
            "https://firms.modaps.eosdis.nasa.gov/api/area/csv/***/VIIRS_SNPP_NRT/-118.9,33.7,-117.6,34.8/1"
        );
    }

    #[tokio::test]
    async fn connection_errors_do_not_carry_the_url() {
        let client = reqwest::Client::new();
        let url = "http://127.0.0.1:9/api/area/csv/SECRETKEY123/VIIRS_SNPP_NRT/1";

        let err = send_text(|| client.get(url), RetryPolicy::none())
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Http(_)));
        assert!(!err.to_string().contains("SECRETKEY123"));
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
    }

    #[test]
    fn leaves_other_urls_alone() {
        let url = "https://maps.lacity.org/lahub/rest/services/Boundaries/MapServer/15/query?f=geojson";
        assert_eq!(redact(url), url);
    }
}
