//! REST client for the zone catalog, visit history, and visit creation services.

use std::collections::HashSet;
use std::time::Duration;

use citystamp_core::Zone;
use thiserror::Error;
use tracing::{info, warn};

/// Bounded retry count for catalog and history fetches. Transient network
/// failures only; HTTP error statuses are not retried, and visit creation is
/// never retried automatically.
const FETCH_RETRIES: u32 = 2;

const NONCE_HEADER: &str = "X-WP-Nonce";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
}

/// Connection settings supplied by the host once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL like `https://example.org` (trailing slash tolerated).
    pub base_url: String,
    /// Per-session token sent on authenticated calls.
    pub nonce: String,
}

/// Client for the collector backend's REST endpoints.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    nonce: String,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            nonce: config.nonce,
        }
    }

    /// Fetch the ordered zone catalog.
    pub async fn fetch_zones(&self) -> Result<Vec<Zone>, ApiError> {
        let url = format!("{}/wp-json/citycollector/v1/zones", self.base_url);
        let resp = self.get_with_retry(&url, false).await?;
        let zones: Vec<Zone> = resp.json().await?;
        info!(count = zones.len(), "fetched zone catalog");
        Ok(zones)
    }

    /// Fetch the set of zone ids the current user has already collected.
    pub async fn fetch_my_visits(&self) -> Result<HashSet<String>, ApiError> {
        let url = format!("{}/wp-json/citycollector/v1/my-visits", self.base_url);
        let resp = self.get_with_retry(&url, true).await?;
        let ids: Vec<String> = resp.json().await?;
        info!(count = ids.len(), "fetched visit history");
        Ok(ids.into_iter().collect())
    }

    /// Record a visit: posts the zone id and the stamped image.
    ///
    /// Returns the server's human-readable message on success. Not retried;
    /// a failed attempt is terminal and requires explicit user action.
    pub async fn create_visit(
        &self,
        poi_id: &str,
        image_data_url: &str,
    ) -> Result<String, ApiError> {
        let url = format!("{}/create/", self.base_url);
        let form = [("poi_id", poi_id), ("image_data_url", image_data_url)];

        info!(poi_id, url = %url, "submitting visit");
        let resp = self
            .client
            .post(&url)
            .header(NONCE_HEADER, &self.nonce)
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = leading_message(&body).to_string();

        if status.is_success() {
            info!(poi_id, "visit recorded");
            Ok(message)
        } else {
            Err(ApiError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get_with_retry(
        &self,
        url: &str,
        authenticated: bool,
    ) -> Result<reqwest::Response, ApiError> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.get(url);
            if authenticated {
                request = request.header(NONCE_HEADER, &self.nonce);
            }
            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(ApiError::Server {
                            status: status.as_u16(),
                            message: leading_message(&body).to_string(),
                        });
                    }
                    return Ok(resp);
                }
                Err(err) if attempt < FETCH_RETRIES => {
                    attempt += 1;
                    warn!(url, attempt, error = %err, "fetch failed, retrying");
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(err) => return Err(ApiError::Http(err)),
            }
        }
    }
}

/// Trim a response body down to its leading message line.
///
/// Backends answer with a short plain-text message sometimes followed by
/// markup or further lines; cut at the first `<` or line break. A body that
/// starts with one of those yields the whole trimmed body instead.
fn leading_message(body: &str) -> &str {
    match body.find(['<', '\n', '\r']) {
        Some(end) if end > 0 => body[..end].trim(),
        _ => body.trim(),
    }
}
