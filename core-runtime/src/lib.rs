//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the firm sync service:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//! - Prometheus-backed metrics registry
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, the settings every component reads,
//! and the event broadcasting used to observe sync runs and lock activity.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;

pub use error::{Error, Result};
