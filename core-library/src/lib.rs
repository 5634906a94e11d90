//! # Firm Library Module
//!
//! Owns the local mirror of provider firms and offices and provides
//! repository patterns for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Domain models for firms, offices, office assignments and the sync watermark
//! - Repositories that run on a caller-supplied connection, so several
//!   writes can share one transaction

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
