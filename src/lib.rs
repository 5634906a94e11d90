//! Workspace placeholder crate.
//!
//! This crate exposes the `native` feature, which maps to the `core-service`
//! crate and its tokio/reqwest/SQLite wiring. Deployments can depend on
//! `firm-sync-workspace` and get the whole reconciliation service without
//! wiring each crate individually.

#[cfg(feature = "native")]
pub use core_service::*;
