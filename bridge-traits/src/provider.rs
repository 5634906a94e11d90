//! Provider Client Abstraction
//!
//! The authoritative firm/office dataset comes from an external provider.
//! Connectors flatten whatever the provider sends into [`ProviderDataset`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A firm as reported upstream. Codes are natural keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFirm {
    pub code: String,
    pub name: String,
    /// Raw type label, e.g. `"LEGAL SERVICES PROVIDER"` or `"Chambers"`.
    pub firm_type: Option<String>,
    pub parent_code: Option<String>,
}

/// An office as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOffice {
    pub code: String,
    pub firm_code: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_line3: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
}

/// Full snapshot returned by one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDataset {
    pub firms: Vec<ProviderFirm>,
    pub offices: Vec<ProviderOffice>,
}

impl ProviderDataset {
    pub fn is_empty(&self) -> bool {
        self.offices.is_empty()
    }
}

/// Source of the authoritative dataset.
///
/// # Example
///
/// ```ignore
/// let dataset = client.fetch_firms_and_offices(window.from, window.to).await?;
/// tracing::info!(firms = dataset.firms.len(), offices = dataset.offices.len(), "Fetched");
/// ```
#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetch the snapshot covering `[from, to]`.
    ///
    /// # Errors
    ///
    /// Any transport, status or parse failure. Callers treat all of them as
    /// "no data this run".
    async fn fetch_firms_and_offices(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ProviderDataset>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_dataset() {
        let mut mock = MockProviderClient::new();
        mock.expect_fetch_firms_and_offices().returning(|_, _| {
            Ok(ProviderDataset {
                firms: vec![ProviderFirm {
                    code: "F1".to_string(),
                    name: "Firm One".to_string(),
                    firm_type: Some("CHAMBERS".to_string()),
                    parent_code: None,
                }],
                offices: Vec::new(),
            })
        });

        let now = Utc::now();
        let dataset = mock.fetch_firms_and_offices(now, now).await.unwrap();

        assert_eq!(dataset.firms.len(), 1);
        assert!(dataset.is_empty());
    }
}
