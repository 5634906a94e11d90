//! Lease rows in the `distributed_locks` table
//!
//! Every mutation is a single statement so two instances racing on the same
//! key cannot both observe an expired lease and both take it.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;

/// One row of the lock table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LockRecord {
    pub lock_key: String,
    pub owner_id: String,
    /// Unix epoch milliseconds
    pub expires_at: i64,
}

impl LockRecord {
    pub fn is_live(&self, now_millis: i64) -> bool {
        self.expires_at > now_millis
    }
}

/// Persistence for lease rows.
///
/// All timestamps are unix epoch milliseconds.
#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Insert the lease, or take over a row whose lease expired at or before
    /// `now`.
    ///
    /// # Returns
    /// Rows affected: `1` when acquired, `0` when a live lease exists.
    async fn acquire(&self, key: &str, owner_id: &str, expires_at: i64, now: i64) -> Result<u64>;

    /// Delete the row for `(key, owner_id)`. Missing rows are not an error.
    async fn release(&self, key: &str, owner_id: &str) -> Result<u64>;

    /// Push the expiry of a lease still owned by `owner_id`.
    ///
    /// # Returns
    /// `0` when the row is gone or belongs to someone else.
    async fn extend(&self, key: &str, owner_id: &str, new_expires_at: i64) -> Result<u64>;

    async fn find(&self, key: &str) -> Result<Option<LockRecord>>;
}

/// SQLite-backed lock store sharing the application database.
#[derive(Debug, Clone)]
pub struct SqliteLockStore {
    pool: SqlitePool,
}

impl SqliteLockStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockStore for SqliteLockStore {
    async fn acquire(&self, key: &str, owner_id: &str, expires_at: i64, now: i64) -> Result<u64> {
        // A live lease is never taken over, not even by its own owner.
        let result = sqlx::query(
            r#"
            INSERT INTO distributed_locks (lock_key, owner_id, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(lock_key) DO UPDATE SET
                owner_id = excluded.owner_id,
                expires_at = excluded.expires_at
            WHERE distributed_locks.expires_at <= ?
            "#,
        )
        .bind(key)
        .bind(owner_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn release(&self, key: &str, owner_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM distributed_locks WHERE lock_key = ? AND owner_id = ?")
            .bind(key)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn extend(&self, key: &str, owner_id: &str, new_expires_at: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE distributed_locks SET expires_at = ? WHERE lock_key = ? AND owner_id = ?",
        )
        .bind(new_expires_at)
        .bind(key)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find(&self, key: &str) -> Result<Option<LockRecord>> {
        let record = sqlx::query_as::<_, LockRecord>(
            "SELECT lock_key, owner_id, expires_at FROM distributed_locks WHERE lock_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::create_test_pool;

    async fn store() -> SqliteLockStore {
        SqliteLockStore::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_acquire_free_key() {
        let store = store().await;

        assert_eq!(store.acquire("pda-sync", "a", 2_000, 1_000).await.unwrap(), 1);

        let record = store.find("pda-sync").await.unwrap().unwrap();
        assert_eq!(record.owner_id, "a");
        assert!(record.is_live(1_500));
        assert!(!record.is_live(2_000));
    }

    #[tokio::test]
    async fn test_live_lease_is_not_taken_over() {
        let store = store().await;
        store.acquire("pda-sync", "a", 2_000, 1_000).await.unwrap();

        assert_eq!(store.acquire("pda-sync", "b", 3_000, 1_500).await.unwrap(), 0);
        // Same owner is refused as well.
        assert_eq!(store.acquire("pda-sync", "a", 3_000, 1_500).await.unwrap(), 0);

        let record = store.find("pda-sync").await.unwrap().unwrap();
        assert_eq!(record.owner_id, "a");
        assert_eq!(record.expires_at, 2_000);
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let store = store().await;
        store.acquire("pda-sync", "a", 2_000, 1_000).await.unwrap();

        assert_eq!(store.acquire("pda-sync", "b", 4_000, 2_000).await.unwrap(), 1);

        let record = store.find("pda-sync").await.unwrap().unwrap();
        assert_eq!(record.owner_id, "b");
        assert_eq!(record.expires_at, 4_000);
    }

    #[tokio::test]
    async fn test_release_by_non_owner_is_noop() {
        let store = store().await;
        store.acquire("pda-sync", "a", 2_000, 1_000).await.unwrap();

        assert_eq!(store.release("pda-sync", "b").await.unwrap(), 0);
        assert!(store.find("pda-sync").await.unwrap().is_some());

        assert_eq!(store.release("pda-sync", "a").await.unwrap(), 1);
        assert!(store.find("pda-sync").await.unwrap().is_none());
        assert_eq!(store.release("pda-sync", "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_extend_only_for_owner() {
        let store = store().await;
        store.acquire("pda-sync", "a", 2_000, 1_000).await.unwrap();

        assert_eq!(store.extend("pda-sync", "b", 9_000).await.unwrap(), 0);
        assert_eq!(store.extend("pda-sync", "a", 5_000).await.unwrap(), 1);
        assert_eq!(store.extend("other-key", "a", 5_000).await.unwrap(), 0);

        let record = store.find("pda-sync").await.unwrap().unwrap();
        assert_eq!(record.expires_at, 5_000);
    }
}
