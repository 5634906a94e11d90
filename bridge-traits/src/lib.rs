//! # Host Bridge Traits
//!
//! Capability contracts between the sync core and its host environment.
//!
//! ## Overview
//!
//! The core never talks to the network, the clock, timers or a metrics backend
//! directly. Each of those is a trait here, implemented by `bridge-native` for
//! production and by mocks in tests.
//!
//! ## Traits
//!
//! ### Networking & Data
//! - [`HttpClient`](http::HttpClient) - Async HTTP with a retry policy
//! - [`ProviderClient`](provider::ProviderClient) - Authoritative firm/office dataset
//!
//! ### Scheduling & Observability
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - Recurring task scheduling
//! - [`MetricsSink`](metrics::MetricsSink) - Counters and timers with tags
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert their own errors into it and keep the message actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`.

pub mod background;
pub mod error;
pub mod http;
pub mod metrics;
pub mod provider;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{BackgroundExecutor, TaskId, TaskStatus};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use metrics::{MetricsSink, NoopMetrics, Tags};
pub use provider::{ProviderClient, ProviderDataset, ProviderFirm, ProviderOffice};
pub use time::{Clock, ManualClock, SystemClock};
