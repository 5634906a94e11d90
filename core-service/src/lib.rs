//! Core service façade and bootstrap helpers.
//!
//! This crate wires the SQLite pool, the lease lock, the provider client, the
//! reconciliation engine and the scheduler into one [`SyncService`] handle.
//! The default `native` feature pulls in `bridge-native` for the tokio task
//! executor and the reqwest HTTP client; the `firm-sync` binary requires it.
//!
//! ```ignore
//! use core_service::{SyncService, SyncSettings};
//!
//! let settings = SyncSettings::from_env()?;
//! let service = SyncService::bootstrap(settings).await?;
//! service.start().await?;
//! // ... wait for a shutdown signal ...
//! service.shutdown().await?;
//! ```

pub mod error;

#[cfg(feature = "native")]
mod service;

pub use error::{CoreError, Result};

#[cfg(feature = "native")]
pub use service::{build_provider, SyncService};

pub use core_runtime::config::SyncSettings;
pub use core_sync::{SyncPreview, SyncResult, TickOutcome};
