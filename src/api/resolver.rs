//! Server resolver
//!
//! Looks a server up on the panel and turns the answer into
//! [`ConnectionParams`](crate::console::types::ConnectionParams).

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{ResolvedServer, ServerDetails};
use crate::config::PanelConfig;

/// Panel API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Panel returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Invalid panel URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode panel response: {0}")]
    Decode(String),
}

/// Source of connection parameters for a server
#[async_trait]
pub trait ServerResolver: Send + Sync {
    async fn resolve(&self, server_id: &str) -> Result<ResolvedServer, ApiError>;
}

/// `{base}/servers/{id}?include[node]=true&include[status]=true`
pub fn server_url(base_url: &str, server_id: &str) -> Result<Url, ApiError> {
    if server_id.trim().is_empty() {
        return Err(ApiError::InvalidUrl("server identifier is empty".to_string()));
    }

    let mut url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base URL", base_url)))?
        .pop_if_empty()
        .push("servers")
        .push(server_id);
    url.query_pairs_mut()
        .append_pair("include[node]", "true")
        .append_pair("include[status]", "true");
    Ok(url)
}

/// reqwest-backed resolver authenticating with the panel bearer token
pub struct PanelClient {
    http: Client,
    base_url: String,
    token: String,
}

impl PanelClient {
    pub fn new(config: &PanelConfig, token: impl Into<String>) -> Result<Self, ApiError> {
        if config.base_url.trim().is_empty() {
            return Err(ApiError::InvalidUrl("panel base URL is not configured".to_string()));
        }
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl ServerResolver for PanelClient {
    async fn resolve(&self, server_id: &str) -> Result<ResolvedServer, ApiError> {
        let url = server_url(&self.base_url, server_id)?;
        debug!("Resolving server {} via {}", server_id, url.path());

        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("Panel lookup for {} failed with {}", server_id, status);
            return Err(ApiError::Status { status, body });
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let details = ServerDetails::from_body(body).map_err(|e| ApiError::Decode(e.to_string()))?;

        // The daemon accepts the same bearer token the panel issued
        Ok(details.into_resolved(&self.token))
    }
}
