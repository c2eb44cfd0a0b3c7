use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shield_config::ApiConfig;
use shield_model::api_routes::{v1, with_id};
use shield_model::{
    CreateScanRequest, CreateScanResponse, ScanHistoryResponse, ScanJob,
    ScanStatusResponse,
};
use tracing::{debug, info};
use url::Url;

use super::{ApiError, ScanApi};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `reqwest`-backed client for the backend scan endpoints.
#[derive(Clone)]
pub struct HttpScanApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl fmt::Debug for HttpScanApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpScanApi")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl HttpScanApi {
    /// Client for the server rooted at `base_url` (e.g.
    /// `http://localhost:8080`); versioned routes are appended to it.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Like [`HttpScanApi::new`] with a per-request timeout.
    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Url::parse(base_url).map_err(|source| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        info!(base_url, "creating scan API client");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Client built from the `api` config section, token included.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let api = Self::with_timeout(&config.base_url, config.request_timeout())?;
        Ok(match &config.token {
            Some(token) => api.with_token(token.clone()),
            None => api,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Server root without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }
}

fn validate_scan_id(scan_id: &str) -> Result<(), ApiError> {
    let invalid = scan_id.trim().is_empty()
        || scan_id.contains(['/', '?', '#', ' ']);
    if invalid {
        Err(ApiError::InvalidScanId(scan_id.to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ScanApi for HttpScanApi {
    async fn create_scan(&self, target: &str) -> Result<String, ApiError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ApiError::EmptyTarget);
        }

        let request = self
            .client
            .post(self.build_url(v1::scans::COLLECTION))
            .json(&CreateScanRequest {
                target: target.to_string(),
            });
        let created: CreateScanResponse = self.execute(request).await?;

        info!(scan_id = %created.scan_id, scan_target = target, "scan created");
        Ok(created.scan_id)
    }

    async fn scan_status(&self, scan_id: &str) -> Result<ScanJob, ApiError> {
        validate_scan_id(scan_id)?;

        let url = self.build_url(&with_id(v1::scans::ITEM, scan_id));
        let response: ScanStatusResponse =
            self.execute(self.client.get(url)).await?;

        debug!(scan_id, status = %response.status, "fetched scan status");
        Ok(response.into_job(scan_id))
    }

    async fn scan_history(&self) -> Result<Vec<ScanJob>, ApiError> {
        let request = self.client.get(self.build_url(v1::scans::COLLECTION));
        let history: ScanHistoryResponse = self.execute(request).await?;

        debug!(count = history.scans.len(), "fetched scan history");
        Ok(history.scans.into_iter().map(ScanJob::from).collect())
    }
}
