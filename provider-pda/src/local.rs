//! Snapshot file provider
//!
//! Reads a saved PDA snapshot from disk instead of calling the API. The
//! window is ignored; the file is the whole dataset.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::provider::{ProviderClient, ProviderDataset};
use chrono::{DateTime, Utc};
use core_runtime::logging::strip_path;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::error::PdaError;
use crate::types::parse_snapshot;

#[derive(Debug, Clone)]
pub struct LocalSnapshotProvider {
    path: PathBuf,
}

impl LocalSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProviderClient for LocalSnapshotProvider {
    #[instrument(skip(self), fields(file = %strip_path(&self.path.to_string_lossy())))]
    async fn fetch_firms_and_offices(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<ProviderDataset> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PdaError::FileError {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        let dataset = parse_snapshot(&body)?;
        info!(
            firms = dataset.firms.len(),
            offices = dataset.offices.len(),
            "Loaded provider snapshot from file"
        );
        Ok(dataset)
    }
}
