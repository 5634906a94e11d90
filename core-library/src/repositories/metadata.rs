//! Sync watermark persistence
//!
//! A single row with `id = 1`; instants are stored as unix milliseconds.

use crate::error::{LibraryError, Result};
use crate::models::SyncMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

#[async_trait]
pub trait SyncMetadataRepository: Send + Sync {
    /// Read the watermark, `None` before the first successful run
    async fn load(&self, conn: &mut SqliteConnection) -> Result<Option<SyncMetadata>>;

    /// Insert or replace the watermark
    async fn save(&self, conn: &mut SqliteConnection, metadata: &SyncMetadata) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct SqliteSyncMetadataRepository;

impl SqliteSyncMetadataRepository {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, FromRow)]
struct SyncMetadataRow {
    last_successful_from: i64,
    last_successful_to: i64,
    updated_at: i64,
}

fn instant(field: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| LibraryError::InvalidInput {
        field: field.to_string(),
        message: format!("{} is not a valid timestamp", millis),
    })
}

impl TryFrom<SyncMetadataRow> for SyncMetadata {
    type Error = LibraryError;

    fn try_from(row: SyncMetadataRow) -> Result<Self> {
        Ok(SyncMetadata {
            last_successful_from: instant("last_successful_from", row.last_successful_from)?,
            last_successful_to: instant("last_successful_to", row.last_successful_to)?,
            updated_at: instant("updated_at", row.updated_at)?,
        })
    }
}

#[async_trait]
impl SyncMetadataRepository for SqliteSyncMetadataRepository {
    async fn load(&self, conn: &mut SqliteConnection) -> Result<Option<SyncMetadata>> {
        let row = sqlx::query_as::<_, SyncMetadataRow>(
            r#"
            SELECT last_successful_from, last_successful_to, updated_at
            FROM sync_metadata
            WHERE id = 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?;

        row.map(SyncMetadata::try_from).transpose()
    }

    async fn save(&self, conn: &mut SqliteConnection, metadata: &SyncMetadata) -> Result<()> {
        if metadata.last_successful_from > metadata.last_successful_to {
            return Err(LibraryError::InvalidInput {
                field: "sync_metadata".to_string(),
                message: "window start is after window end".to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO sync_metadata (id, last_successful_from, last_successful_to, updated_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_successful_from = excluded.last_successful_from,
                last_successful_to = excluded.last_successful_to,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(metadata.last_successful_from.timestamp_millis())
        .bind(metadata.last_successful_to.timestamp_millis())
        .bind(metadata.updated_at.timestamp_millis())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_load_before_first_save_is_none() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let loaded = SqliteSyncMetadataRepository::new()
            .load(&mut conn)
            .await
            .unwrap();

        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_single_row() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteSyncMetadataRepository::new();
        let to = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        for hours in [2, 1] {
            let metadata = SyncMetadata {
                last_successful_from: to - Duration::hours(hours),
                last_successful_to: to - Duration::hours(hours - 1),
                updated_at: to,
            };
            repo.save(&mut conn, &metadata).await.unwrap();
        }

        let loaded = repo.load(&mut conn).await.unwrap().unwrap();
        assert_eq!(loaded.last_successful_to, to);
        assert_eq!(loaded.last_successful_from, to - Duration::hours(1));

        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_metadata")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(rows.0, 1);
    }

    #[tokio::test]
    async fn test_inverted_window_rejected() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let now = Utc::now();

        let result = SqliteSyncMetadataRepository::new()
            .save(
                &mut conn,
                &SyncMetadata {
                    last_successful_from: now,
                    last_successful_to: now - Duration::minutes(1),
                    updated_at: now,
                },
            )
            .await;

        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }
}
