//! HTTP post publisher.
//!
//! Posts the JSON payload to a single endpoint. A 429 response becomes a
//! `RateLimited` outcome; the retry delay is read from `Retry-After`
//! (seconds) or, failing that, `RateLimit-Reset` (unix epoch seconds).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{info, warn};
use url::Url;

use super::PostPublisher;
use crate::error::PublishError;
use crate::queue::{PostOutcome, PostPayload};

/// Publisher that POSTs each payload to a configured URL.
#[derive(Clone)]
pub struct HttpPublisher {
    client: Client,
    endpoint: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpPublisher {
    /// Create a publisher for `endpoint`.
    ///
    /// Fails when the endpoint is not an absolute http(s) URL.
    pub fn new(
        client: Client,
        endpoint: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PublishError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PublishError::Other(format!("invalid publisher url {}: {}", endpoint, e)))?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(PublishError::Other(format!(
                "unsupported publisher url scheme: {}",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            client,
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PostPublisher for HttpPublisher {
    async fn post(&self, payload: &PostPayload) -> Result<PostOutcome, PublishError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(payload);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            info!(
                status_code = status.as_u16(),
                content_length = payload.content.len(),
                "publisher_post_accepted"
            );
            return Ok(PostOutcome::Published);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_from_headers(response.headers(), SystemTime::now());
            warn!(
                retry_after_secs = ?retry_after.map(|d| d.as_secs()),
                "publisher_post_rate_limited"
            );
            return Ok(PostOutcome::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(500).collect();
        warn!(status_code = status.as_u16(), body = %body, "publisher_post_rejected");

        Err(PublishError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Read a retry hint from a 429 response.
fn retry_after_from_headers(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    // `Retry-After: 0` carries no usable delay
    if let Some(secs) = header(RETRY_AFTER.as_str()).filter(|secs| *secs > 0) {
        return Some(Duration::from_secs(secs));
    }

    let reset = header("ratelimit-reset")?;
    let now = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    Some(Duration::from_secs(reset.saturating_sub(now).max(1)))
}
