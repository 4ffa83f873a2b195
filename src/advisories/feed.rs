use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{AdvisoryFeed, AdvisoryKind, AdvisoryRecord, BoundingBox};
use crate::config::AdvisoryConfig;
use crate::{Result, TurbcastError};

/// Client for the aviation weather JSON data API
pub struct HttpAdvisoryFeed {
    client: Client,
    base_url: String,
}

impl HttpAdvisoryFeed {
    /// Create a new client
    pub fn new(config: &AdvisoryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_seconds)))
            .user_agent(concat!("turbcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TurbcastError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn url_for(&self, kind: AdvisoryKind, bbox: &BoundingBox) -> String {
        format!(
            "{}/{}?format=json&bbox={}",
            self.base_url,
            kind.endpoint(),
            bbox.query_value()
        )
    }
}

/// Parse a feed body. The API answers an empty body when nothing matches.
pub fn parse_records(kind: AdvisoryKind, body: &str) -> Result<Vec<AdvisoryRecord>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body)
        .map_err(|e| TurbcastError::upstream(format!("Failed to parse {kind} response: {e}")))
}

#[async_trait]
impl AdvisoryFeed for HttpAdvisoryFeed {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, kind: AdvisoryKind, bbox: &BoundingBox) -> Result<Vec<AdvisoryRecord>> {
        let response = self
            .client
            .get(self.url_for(kind, bbox))
            .send()
            .await
            .map_err(|e| TurbcastError::upstream(format!("{kind} request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TurbcastError::upstream(format!(
                "{kind} feed error {status}: {error_text}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TurbcastError::upstream(format!("Failed to read {kind} response: {e}")))?;

        let records = parse_records(kind, &body)?;
        debug!(count = records.len(), "Fetched {kind} records");
        Ok(records)
    }
}
