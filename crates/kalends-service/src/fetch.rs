//! HTTP layer: URL canonicalization, conditional metadata, and payload
//! fetching.

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::error::{ServiceError, ServiceResult};

/// User agent presented to calendar hosts. Some (Exchange Online among
/// them) reject obviously non-browser agents.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; kalends/0.1)";

const ACCEPT: &str = "text/calendar, text/html, application/xml;q=0.9, */*;q=0.8";

/// Length of the hex content fingerprint.
const FINGERPRINT_LEN: usize = 16;

/// Canonicalizes a calendar URL for fetching and cache keying.
///
/// The `webcal` and `ical` scheme aliases are rewritten to `https`, and a
/// missing scheme gets `https` prepended. Plain `http` is passed through.
#[must_use]
pub fn canonicalize_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("webcal://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("ical://") {
        format!("https://{rest}")
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Short hex fingerprint of a payload, kept for change diagnostics when
/// validator headers are absent.
#[must_use]
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let mut digest = hex::encode(Sha256::digest(bytes));
    digest.truncate(FINGERPRINT_LEN);
    digest
}

/// Validator metadata observed on a HEAD response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMetadata {
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub content_length: Option<u64>,
}

/// A fetched feed body plus the validators observed with it.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub body: String,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub content_length: u64,
    pub fingerprint: String,
}

/// Thin wrapper over the HTTP client with the headers calendar hosts
/// expect.
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    http: reqwest::Client,
}

impl Fetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a metadata-only HEAD request.
    ///
    /// ## Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn head(&self, url: &str, timeout: Duration) -> ServiceResult<FeedMetadata> {
        tracing::debug!(url, "HEAD request");
        let response = self.request(self.http.head(url), timeout).await?;

        Ok(FeedMetadata {
            last_modified: header_string(&response, reqwest::header::LAST_MODIFIED),
            etag: header_string(&response, reqwest::header::ETAG),
            content_length: header_string(&response, reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.parse().ok()),
        })
    }

    /// Fetches the full payload. A 304 response yields `Ok(None)`.
    ///
    /// ## Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> ServiceResult<Option<FetchedFeed>> {
        tracing::debug!(url, "GET request");
        let response = match self.request(self.http.get(url), timeout).await {
            Ok(response) => response,
            Err(ServiceError::Status(304)) => return Ok(None),
            Err(err) => return Err(err),
        };

        let last_modified = header_string(&response, reqwest::header::LAST_MODIFIED);
        let etag = header_string(&response, reqwest::header::ETAG);

        let bytes = response.bytes().await?;
        let fingerprint = content_fingerprint(&bytes);
        let content_length = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        let body = String::from_utf8_lossy(&bytes).into_owned();

        tracing::debug!(url, bytes = content_length, fingerprint, "Payload fetched");

        Ok(Some(FetchedFeed {
            body,
            last_modified,
            etag,
            content_length,
            fingerprint,
        }))
    }

    async fn request(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> ServiceResult<reqwest::Response> {
        let response = builder
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_ENCODING, "identity")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ServiceError::Status(response.status().as_u16()))
        }
    }
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
