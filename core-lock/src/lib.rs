//! # Distributed Lease Lock
//!
//! Mutual exclusion between service instances that share a database, using
//! one row per lock key instead of an external coordination service.
//!
//! - [`store`] - the `distributed_locks` table behind the [`LockStore`] trait
//! - [`coordinator`] - [`LockCoordinator::with_lock`] and lease renewal

pub mod coordinator;
pub mod error;
pub mod store;

pub use coordinator::LockCoordinator;
pub use error::{LockError, Result};
pub use store::{LockRecord, LockStore, SqliteLockStore};

#[cfg(any(test, feature = "test-mocks"))]
pub use store::MockLockStore;
