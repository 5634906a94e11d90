//! Firm repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{Firm, FirmType};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection};

/// Firm repository interface for data access operations
#[async_trait]
pub trait FirmRepository: Send + Sync {
    /// Load every firm, active or not, ordered by code
    async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Firm>>;

    /// Find a firm by its natural key
    ///
    /// # Returns
    /// - `Ok(Some(firm))` if found
    /// - `Ok(None)` if not found
    async fn find_by_code(&self, conn: &mut SqliteConnection, code: &str) -> Result<Option<Firm>>;

    /// Insert a new firm
    ///
    /// # Errors
    /// Returns error if:
    /// - Firm validation fails
    /// - Code or name is already taken
    /// - Database error occurs
    async fn insert(&self, conn: &mut SqliteConnection, firm: &Firm) -> Result<()>;

    /// Write name, parent and active flag of an existing firm
    ///
    /// # Errors
    /// Returns `NotFound` if no firm has `firm.id`.
    async fn update(&self, conn: &mut SqliteConnection, firm: &Firm) -> Result<()>;

    /// Set or clear the parent of a firm
    async fn set_parent(
        &self,
        conn: &mut SqliteConnection,
        firm_id: &str,
        parent_firm_id: Option<&str>,
        now: i64,
    ) -> Result<()>;

    /// Flip the active flag of a firm
    async fn set_active(
        &self,
        conn: &mut SqliteConnection,
        firm_id: &str,
        active: bool,
        now: i64,
    ) -> Result<()>;

    /// Detach every child of `parent_firm_id`
    ///
    /// # Returns
    /// Number of child firms detached
    async fn clear_children(
        &self,
        conn: &mut SqliteConnection,
        parent_firm_id: &str,
        now: i64,
    ) -> Result<u64>;

    /// Active firms that have no active office
    async fn find_active_without_active_offices(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Firm>>;
}

/// SQLite implementation of FirmRepository
#[derive(Debug, Clone, Default)]
pub struct SqliteFirmRepository;

impl SqliteFirmRepository {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, FromRow)]
struct FirmRow {
    id: String,
    code: String,
    name: String,
    firm_type: String,
    parent_firm_id: Option<String>,
    active: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<FirmRow> for Firm {
    type Error = LibraryError;

    fn try_from(row: FirmRow) -> Result<Self> {
        let firm_type =
            row.firm_type
                .parse::<FirmType>()
                .map_err(|message| LibraryError::InvalidInput {
                    field: "firm_type".to_string(),
                    message,
                })?;

        Ok(Firm {
            id: row.id,
            code: row.code,
            name: row.name,
            firm_type,
            parent_firm_id: row.parent_firm_id,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_FIRM: &str = r#"
    SELECT id, code, name, firm_type, parent_firm_id, active, created_at, updated_at
    FROM firms
"#;

fn ensure_found(rows_affected: u64, id: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(LibraryError::NotFound {
            entity_type: "Firm".to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl FirmRepository for SqliteFirmRepository {
    async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Firm>> {
        let rows = sqlx::query_as::<_, FirmRow>(&format!("{} ORDER BY code", SELECT_FIRM))
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(Firm::try_from).collect()
    }

    async fn find_by_code(&self, conn: &mut SqliteConnection, code: &str) -> Result<Option<Firm>> {
        let row = sqlx::query_as::<_, FirmRow>(&format!("{} WHERE code = ?", SELECT_FIRM))
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(Firm::try_from).transpose()
    }

    async fn insert(&self, conn: &mut SqliteConnection, firm: &Firm) -> Result<()> {
        firm.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "firm".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO firms (
                id, code, name, firm_type, parent_firm_id, active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&firm.id)
        .bind(&firm.code)
        .bind(&firm.name)
        .bind(firm.firm_type.as_str())
        .bind(&firm.parent_firm_id)
        .bind(firm.active)
        .bind(firm.created_at)
        .bind(firm.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection, firm: &Firm) -> Result<()> {
        firm.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "firm".to_string(),
            message: msg,
        })?;

        let result = sqlx::query(
            r#"
            UPDATE firms
            SET name = ?, parent_firm_id = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&firm.name)
        .bind(&firm.parent_firm_id)
        .bind(firm.active)
        .bind(firm.updated_at)
        .bind(&firm.id)
        .execute(&mut *conn)
        .await?;

        ensure_found(result.rows_affected(), &firm.id)
    }

    async fn set_parent(
        &self,
        conn: &mut SqliteConnection,
        firm_id: &str,
        parent_firm_id: Option<&str>,
        now: i64,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE firms SET parent_firm_id = ?, updated_at = ? WHERE id = ?")
                .bind(parent_firm_id)
                .bind(now)
                .bind(firm_id)
                .execute(&mut *conn)
                .await?;

        ensure_found(result.rows_affected(), firm_id)
    }

    async fn set_active(
        &self,
        conn: &mut SqliteConnection,
        firm_id: &str,
        active: bool,
        now: i64,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE firms SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now)
            .bind(firm_id)
            .execute(&mut *conn)
            .await?;

        ensure_found(result.rows_affected(), firm_id)
    }

    async fn clear_children(
        &self,
        conn: &mut SqliteConnection,
        parent_firm_id: &str,
        now: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE firms SET parent_firm_id = NULL, updated_at = ? WHERE parent_firm_id = ?",
        )
        .bind(now)
        .bind(parent_firm_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_active_without_active_offices(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Firm>> {
        let rows = sqlx::query_as::<_, FirmRow>(&format!(
            r#"{}
            WHERE active = 1
              AND NOT EXISTS (
                  SELECT 1 FROM offices o WHERE o.firm_id = firms.id AND o.active = 1
              )
            ORDER BY code"#,
            SELECT_FIRM
        ))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Firm::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn firm(code: &str, name: &str) -> Firm {
        Firm::new(
            code.to_string(),
            name.to_string(),
            FirmType::LegalServicesProvider,
            1_700_000_000,
        )
    }

    #[tokio::test]
    async fn test_insert_and_find_firm() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteFirmRepository::new();

        let firm = firm("FRA", "Firm A");
        repo.insert(&mut conn, &firm).await.unwrap();

        let by_code = repo.find_by_code(&mut conn, "FRA").await.unwrap();
        assert_eq!(by_code, Some(firm.clone()));

        assert!(repo.find_by_code(&mut conn, "NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteFirmRepository::new();

        repo.insert(&mut conn, &firm("FRA", "Same Name")).await.unwrap();
        let result = repo.insert(&mut conn, &firm("FRB", "Same Name")).await;

        assert!(matches!(result, Err(LibraryError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_missing_firm_is_not_found() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteFirmRepository::new();

        let result = repo.update(&mut conn, &firm("FRA", "Firm A")).await;

        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_parent_and_children() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteFirmRepository::new();

        let parent = firm("PAR", "Parent");
        let child = firm("CHD", "Child");
        repo.insert(&mut conn, &parent).await.unwrap();
        repo.insert(&mut conn, &child).await.unwrap();

        repo.set_parent(&mut conn, &child.id, Some(&parent.id), 1)
            .await
            .unwrap();
        let loaded = repo.find_by_code(&mut conn, "CHD").await.unwrap().unwrap();
        assert_eq!(loaded.parent_firm_id, Some(parent.id.clone()));

        let detached = repo.clear_children(&mut conn, &parent.id, 2).await.unwrap();
        assert_eq!(detached, 1);
        let loaded = repo.find_by_code(&mut conn, "CHD").await.unwrap().unwrap();
        assert_eq!(loaded.parent_firm_id, None);
    }

    #[tokio::test]
    async fn test_find_active_without_active_offices() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteFirmRepository::new();

        let staffed = firm("FRA", "Firm A");
        let empty = firm("FRB", "Firm B");
        repo.insert(&mut conn, &staffed).await.unwrap();
        repo.insert(&mut conn, &empty).await.unwrap();
        sqlx::query(
            "INSERT INTO offices (id, code, firm_id, active, created_at, updated_at)
             VALUES ('o1', 'OFF1', ?, 1, 0, 0)",
        )
        .bind(&staffed.id)
        .execute(&mut *conn)
        .await
        .unwrap();

        let orphans = repo
            .find_active_without_active_offices(&mut conn)
            .await
            .unwrap();

        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].code, "FRB");

        repo.set_active(&mut conn, &empty.id, false, 3).await.unwrap();
        assert!(repo
            .find_active_without_active_offices(&mut conn)
            .await
            .unwrap()
            .is_empty());
    }
}
