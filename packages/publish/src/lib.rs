#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upload of the rendered map to S3-compatible object storage.
//!
//! ## Smart sync
//!
//! Uploads use **size + MD5/ETag comparison** to skip the transfer when the
//! remote object already matches the local file, so re-publishing an
//! unchanged map costs one `HeadObject` call.
//!
//! # Environment Variables
//!
//! Credentials come from the standard AWS chain (`AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, profiles, instance roles). `AWS_REGION` and
//! `AWS_ENDPOINT_URL` are honoured unless [`PublishTarget`] overrides them.

use std::path::Path;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::StalledStreamProtectionConfig;

/// Content type of the rendered map.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Region used when neither the target nor the environment names one.
const FALLBACK_REGION: &str = "us-east-1";

/// Errors that can occur while publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The file to upload does not exist.
    #[error("{} does not exist", path.display())]
    MissingFile {
        /// Local path that was expected.
        path: std::path::PathBuf,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `HeadObject` failed.
    #[error("Failed to head s3://{bucket}/{key}: {source}")]
    Head {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O error reading local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the map is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub bucket: String,
    pub key: String,
    /// Custom endpoint for S3-compatible services. Enables path-style
    /// addressing.
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
}

impl PublishTarget {
    /// `s3://bucket/key` form for log output.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// What an upload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The object was written.
    Transferred {
        /// Bytes sent.
        bytes: usize,
    },
    /// The remote object already matched the local file.
    Skipped,
}

impl std::fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transferred { bytes } => write!(f, "uploaded {bytes} bytes"),
            Self::Skipped => f.write_str("skipped (unchanged)"),
        }
    }
}

/// Remote object metadata from `HeadObject`.
struct RemoteMeta {
    /// Content length in bytes.
    size: u64,
    /// `ETag` (usually the MD5 hex digest surrounded by quotes for
    /// non-multipart uploads).
    etag: Option<String>,
}

/// Client for publishing files to one bucket.
pub struct PublishClient {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl PublishClient {
    /// Builds a client for `target` from the standard AWS configuration
    /// chain plus the target's endpoint and region overrides.
    pub async fn new(target: &PublishTarget) -> Self {
        let region = RegionProviderChain::first_try(target.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(FALLBACK_REGION));

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        if let Some(endpoint) = &target.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: target.bucket.clone(),
        }
    }

    /// Uploads a local file to `key`.
    ///
    /// Uses **size + MD5/ETag comparison** to skip the upload when the
    /// remote object already matches the local file.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::MissingFile`] if `local_path` does not exist,
    /// [`PublishError::Head`] or [`PublishError::Upload`] on S3 failures,
    /// and [`PublishError::Io`] on local filesystem errors.
    pub async fn upload(
        &self,
        key: &str,
        local_path: &Path,
        content_type: &str,
    ) -> Result<UploadOutcome, PublishError> {
        let bucket = &self.bucket;

        if !local_path.exists() {
            return Err(PublishError::MissingFile {
                path: local_path.to_path_buf(),
            });
        }

        if let Some(remote) = self.head(key).await?
            && is_local_match(local_path, &remote).await
        {
            log::info!(
                "  {} -> s3://{bucket}/{key}: skipped (unchanged)",
                local_path.display()
            );
            return Ok(UploadOutcome::Skipped);
        }

        let data = tokio::fs::read(local_path).await?;
        let bytes = data.len();
        log::info!(
            "Pushing {} -> s3://{bucket}/{key} ({bytes} bytes)",
            local_path.display(),
        );

        let body = aws_sdk_s3::primitives::ByteStream::from(data);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| PublishError::Upload {
                bucket: bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        log::info!("  uploaded {key}");
        Ok(UploadOutcome::Transferred { bytes })
    }

    /// Fetch object metadata via `HeadObject`.
    ///
    /// Returns `None` if the object doesn't exist (`NotFound`).
    async fn head(&self, key: &str) -> Result<Option<RemoteMeta>, PublishError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let size = output.content_length().unwrap_or(0);
                #[allow(clippy::cast_sign_loss)] // S3 content-length is non-negative
                let size = size as u64;
                let etag = output.e_tag().map(str::to_string);
                Ok(Some(RemoteMeta { size, etag }))
            }
            Err(err) => {
                let service_err = err.as_service_error();
                if service_err
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
                {
                    return Ok(None);
                }
                Err(PublishError::Head {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }
}

/// Publishes the rendered map at `local_path` to `target`.
///
/// # Errors
///
/// Returns any error from [`PublishClient::upload`].
pub async fn publish_map(
    target: &PublishTarget,
    local_path: &Path,
) -> Result<UploadOutcome, PublishError> {
    let client = PublishClient::new(target).await;
    client
        .upload(&target.key, local_path, HTML_CONTENT_TYPE)
        .await
}

/// Checks whether a local file matches the remote object.
///
/// 1. If the local file doesn't exist, returns `false`.
/// 2. Compares file sizes. If they differ, returns `false` immediately.
/// 3. If sizes match AND the remote `ETag` looks like an MD5 hex digest
///    (non-multipart upload), computes the local file's MD5 and compares.
/// 4. If the `ETag` is a multipart `ETag` (contains `-`), falls back to
///    size-only comparison.
async fn is_local_match(local_path: &Path, remote: &RemoteMeta) -> bool {
    let Ok(meta) = tokio::fs::metadata(local_path).await else {
        return false;
    };

    if meta.len() != remote.size {
        return false;
    }

    if let Some(etag) = &remote.etag {
        let clean = etag.trim_matches('"');
        // Multipart ETags contain a `-` (e.g. "abc123-5")
        if !clean.contains('-') && clean.len() == 32 {
            if let Ok(local_md5) = compute_md5(local_path).await {
                return local_md5 == clean;
            }
        }
    }

    true
}

/// Compute MD5 hex digest of a local file.
async fn compute_md5(path: &Path) -> Result<String, std::io::Error> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || compute_md5_sync(&path))
        .await
        .map_err(std::io::Error::other)?
}

/// Synchronous MD5 computation (runs in blocking thread).
fn compute_md5_sync(path: &Path) -> Result<String, std::io::Error> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", context.finalize()))
}
