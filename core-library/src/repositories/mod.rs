//! Repository traits and SQLite implementations
//!
//! Every method takes the connection to run on. Pass a pooled connection for
//! single statements, or `&mut *tx` to group writes in one transaction.

pub mod assignment;
pub mod firm;
pub mod metadata;
pub mod office;

pub use assignment::{AssignmentRepository, SqliteAssignmentRepository};
pub use firm::{FirmRepository, SqliteFirmRepository};
pub use metadata::{SqliteSyncMetadataRepository, SyncMetadataRepository};
pub use office::{OfficeRepository, SqliteOfficeRepository};
