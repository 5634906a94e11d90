//! # Native Bridge Implementations
//!
//! Tokio and reqwest implementations of the bridge traits for server
//! deployments.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with retry and exponential backoff
//! - `BackgroundExecutor` using Tokio timers and tasks
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_native::{ReqwestHttpClient, TokioBackgroundExecutor};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::with_timeout(Duration::from_secs(30))?;
//!     let executor = TokioBackgroundExecutor::new();
//!     // Hand both to the service bootstrap
//!     Ok(())
//! }
//! ```

mod background;
mod http;

pub use background::TokioBackgroundExecutor;
pub use http::ReqwestHttpClient;
