//! Source download: fetch the PDF bytes behind a URL.
//!
//! The bytes stay in memory. Rasterisation reads them directly through
//! pdfium's byte-slice loader; only Markdown extraction needs a file on disk,
//! and that file is created per request by [`crate::convert`].
//!
//! No scheme or reachability validation happens here beyond what reqwest
//! performs. Redirects follow reqwest's default policy.

use crate::error::{Pdf2PngError, Stage};
use std::time::Duration;
use tracing::{debug, info};

/// Downloads source documents over HTTP.
///
/// Cheap to clone: the inner `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher whose calls time out after `timeout` unless
    /// [`Fetcher::fetch_with_timeout`] overrides it.
    pub fn new(timeout: Duration) -> Result<Self, Pdf2PngError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pdf2png-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Pdf2PngError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Download `url` with the default timeout.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, Pdf2PngError> {
        self.fetch_with_timeout(url, self.timeout).await
    }

    /// Download `url`, failing with [`Pdf2PngError::Timeout`] after `timeout`.
    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, Pdf2PngError> {
        info!("Downloading PDF from: {}", url);

        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                Pdf2PngError::Timeout {
                    stage: Stage::Download,
                    secs: timeout.as_secs(),
                }
            } else {
                Pdf2PngError::DownloadFailed {
                    url: url.to_string(),
                    status: e.status().map(|s| s.as_u16()),
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(to_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Pdf2PngError::DownloadFailed {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(to_error)?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);

        Ok(bytes.to_vec())
    }
}
