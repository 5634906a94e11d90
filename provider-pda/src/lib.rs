//! # Provider Data API Client
//!
//! Implements `ProviderClient` for the Provider Data API (PDA), the
//! authoritative source of firms and offices.
//!
//! ## Overview
//!
//! This module provides:
//! - [`PdaConnector`]: the HTTP snapshot endpoint with API key auth and retry
//! - [`LocalSnapshotProvider`]: the same snapshot format read from a file
//! - Flattening of per-office rows into firms and offices

pub mod connector;
pub mod error;
pub mod local;
pub mod types;

pub use connector::PdaConnector;
pub use error::{PdaError, Result};
pub use local::LocalSnapshotProvider;
pub use types::parse_snapshot;
