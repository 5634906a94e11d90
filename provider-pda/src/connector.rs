//! PDA HTTP connector
//!
//! Implements `ProviderClient` against the Provider Data API snapshot
//! endpoint.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::provider::{ProviderClient, ProviderDataset};
use chrono::{DateTime, SecondsFormat, Utc};
use core_runtime::config::ProviderSettings;
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::PdaError;
use crate::types::parse_snapshot;

/// Snapshot endpoint, relative to the configured base URL
const SNAPSHOT_PATH: &str = "/api/v1/provider-offices/snapshot";

/// Header carrying the API key
const AUTH_HEADER: &str = "x-authorization";

/// Provider Data API connector
///
/// # Example
///
/// ```ignore
/// use provider_pda::PdaConnector;
/// use bridge_traits::provider::ProviderClient;
///
/// let connector = PdaConnector::new(http_client, "https://pda.example.com", api_key);
/// let dataset = connector.fetch_firms_and_offices(from, to).await?;
/// ```
pub struct PdaConnector {
    http_client: Arc<dyn HttpClient>,
    /// Base URL without trailing slash
    base_url: String,
    api_key: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl PdaConnector {
    /// Create a new connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `base_url` - API root, e.g. `https://pda.example.com`
    /// * `api_key` - Value sent in the `x-authorization` header
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Build a connector from service settings.
    ///
    /// # Errors
    ///
    /// Fails when no base URL is configured.
    pub fn from_settings(
        http_client: Arc<dyn HttpClient>,
        settings: &ProviderSettings,
    ) -> std::result::Result<Self, PdaError> {
        let base_url = settings.base_url.as_deref().ok_or_else(|| {
            PdaError::Configuration("provider base URL is not set".to_string())
        })?;

        Ok(Self::new(http_client, base_url, settings.api_key.clone()).with_timeout(settings.timeout))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn snapshot_url(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> String {
        format!(
            "{}{}?from={}&to={}",
            self.base_url,
            SNAPSHOT_PATH,
            urlencoding::encode(&from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            urlencoding::encode(&to.to_rfc3339_opts(SecondsFormat::Secs, true)),
        )
    }
}

#[async_trait]
impl ProviderClient for PdaConnector {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_firms_and_offices(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ProviderDataset> {
        let url = self.snapshot_url(from, to);
        debug!(
            url = %url,
            api_key = %redact_if_sensitive("api_key", &self.api_key),
            "Requesting provider snapshot"
        );

        let request = HttpRequest::new(HttpMethod::Get, url)
            .header(AUTH_HEADER, self.api_key.clone())
            .header("Accept", "application/json")
            .timeout(self.timeout);

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "PDA snapshot request failed");
            return Err(PdaError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            }
            .into());
        }

        let dataset = parse_snapshot(&response.body)?;
        info!(
            firms = dataset.firms.len(),
            offices = dataset.offices.len(),
            "Fetched provider snapshot"
        );
        Ok(dataset)
    }
}
