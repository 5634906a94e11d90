//! Office repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{Address, Office};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection};

/// Office repository interface for data access operations
#[async_trait]
pub trait OfficeRepository: Send + Sync {
    /// Load every office, active or not, ordered by code
    async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Office>>;

    /// Find an office by its natural key
    async fn find_by_code(
        &self,
        conn: &mut SqliteConnection,
        code: &str,
    ) -> Result<Option<Office>>;

    /// Offices owned by a firm
    async fn find_by_firm(&self, conn: &mut SqliteConnection, firm_id: &str)
        -> Result<Vec<Office>>;

    /// Insert a new office
    ///
    /// # Errors
    /// Returns error if:
    /// - Office validation fails
    /// - The owning firm does not exist
    /// - Code is already taken
    async fn insert(&self, conn: &mut SqliteConnection, office: &Office) -> Result<()>;

    /// Write firm, address and active flag of an existing office
    ///
    /// # Errors
    /// Returns `NotFound` if no office has `office.id`.
    async fn update(&self, conn: &mut SqliteConnection, office: &Office) -> Result<()>;

    async fn set_active(
        &self,
        conn: &mut SqliteConnection,
        office_id: &str,
        active: bool,
        now: i64,
    ) -> Result<()>;

    /// Delete an office by ID
    ///
    /// # Returns
    /// - `Ok(true)` if the office was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, conn: &mut SqliteConnection, office_id: &str) -> Result<bool>;

    /// Number of active offices owned by a firm
    async fn count_active_by_firm(&self, conn: &mut SqliteConnection, firm_id: &str)
        -> Result<i64>;
}

/// SQLite implementation of OfficeRepository
#[derive(Debug, Clone, Default)]
pub struct SqliteOfficeRepository;

impl SqliteOfficeRepository {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, FromRow)]
struct OfficeRow {
    id: String,
    code: String,
    firm_id: String,
    address_line1: Option<String>,
    address_line2: Option<String>,
    address_line3: Option<String>,
    city: Option<String>,
    postcode: Option<String>,
    active: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<OfficeRow> for Office {
    fn from(row: OfficeRow) -> Self {
        Office {
            id: row.id,
            code: row.code,
            firm_id: row.firm_id,
            address: Address {
                line1: row.address_line1,
                line2: row.address_line2,
                line3: row.address_line3,
                city: row.city,
                postcode: row.postcode,
            },
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_OFFICE: &str = r#"
    SELECT id, code, firm_id, address_line1, address_line2, address_line3,
           city, postcode, active, created_at, updated_at
    FROM offices
"#;

fn validated(office: &Office) -> Result<()> {
    office.validate().map_err(|msg| LibraryError::InvalidInput {
        field: "office".to_string(),
        message: msg,
    })
}

#[async_trait]
impl OfficeRepository for SqliteOfficeRepository {
    async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Office>> {
        let rows = sqlx::query_as::<_, OfficeRow>(&format!("{} ORDER BY code", SELECT_OFFICE))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.into_iter().map(Office::from).collect())
    }

    async fn find_by_code(
        &self,
        conn: &mut SqliteConnection,
        code: &str,
    ) -> Result<Option<Office>> {
        let row = sqlx::query_as::<_, OfficeRow>(&format!("{} WHERE code = ?", SELECT_OFFICE))
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(Office::from))
    }

    async fn find_by_firm(
        &self,
        conn: &mut SqliteConnection,
        firm_id: &str,
    ) -> Result<Vec<Office>> {
        let rows = sqlx::query_as::<_, OfficeRow>(&format!(
            "{} WHERE firm_id = ? ORDER BY code",
            SELECT_OFFICE
        ))
        .bind(firm_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Office::from).collect())
    }

    async fn insert(&self, conn: &mut SqliteConnection, office: &Office) -> Result<()> {
        validated(office)?;

        sqlx::query(
            r#"
            INSERT INTO offices (
                id, code, firm_id, address_line1, address_line2, address_line3,
                city, postcode, active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&office.id)
        .bind(&office.code)
        .bind(&office.firm_id)
        .bind(&office.address.line1)
        .bind(&office.address.line2)
        .bind(&office.address.line3)
        .bind(&office.address.city)
        .bind(&office.address.postcode)
        .bind(office.active)
        .bind(office.created_at)
        .bind(office.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, conn: &mut SqliteConnection, office: &Office) -> Result<()> {
        validated(office)?;

        let result = sqlx::query(
            r#"
            UPDATE offices
            SET firm_id = ?, address_line1 = ?, address_line2 = ?, address_line3 = ?,
                city = ?, postcode = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&office.firm_id)
        .bind(&office.address.line1)
        .bind(&office.address.line2)
        .bind(&office.address.line3)
        .bind(&office.address.city)
        .bind(&office.address.postcode)
        .bind(office.active)
        .bind(office.updated_at)
        .bind(&office.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Office".to_string(),
                id: office.id.clone(),
            });
        }

        Ok(())
    }

    async fn set_active(
        &self,
        conn: &mut SqliteConnection,
        office_id: &str,
        active: bool,
        now: i64,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE offices SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now)
            .bind(office_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Office".to_string(),
                id: office_id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, conn: &mut SqliteConnection, office_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM offices WHERE id = ?")
            .bind(office_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active_by_firm(
        &self,
        conn: &mut SqliteConnection,
        firm_id: &str,
    ) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM offices WHERE firm_id = ? AND active = 1")
                .bind(firm_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Firm, FirmType};
    use crate::repositories::{FirmRepository, SqliteFirmRepository};

    async fn seed_firm(conn: &mut SqliteConnection, code: &str) -> Firm {
        let firm = Firm::new(
            code.to_string(),
            format!("Firm {}", code),
            FirmType::Chambers,
            0,
        );
        SqliteFirmRepository::new().insert(conn, &firm).await.unwrap();
        firm
    }

    fn office(code: &str, firm_id: &str) -> Office {
        Office::new(
            code.to_string(),
            firm_id.to_string(),
            Address::normalized(Some("1 High St"), None, None, Some("Leeds"), Some("LS1 1AA")),
            0,
        )
    }

    #[tokio::test]
    async fn test_insert_find_and_update_office() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteOfficeRepository::new();
        let firm_a = seed_firm(&mut conn, "FRA").await;
        let firm_b = seed_firm(&mut conn, "FRB").await;

        let mut created = office("0A001", &firm_a.id);
        repo.insert(&mut conn, &created).await.unwrap();
        assert_eq!(
            repo.find_by_code(&mut conn, "0A001").await.unwrap(),
            Some(created.clone())
        );

        created.firm_id = firm_b.id.clone();
        created.address.city = None;
        repo.update(&mut conn, &created).await.unwrap();

        let moved = repo.find_by_firm(&mut conn, &firm_b.id).await.unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].address.city, None);
        assert!(repo.find_by_firm(&mut conn, &firm_a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_office_requires_existing_firm() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteOfficeRepository::new();

        let result = repo.insert(&mut conn, &office("0A001", "missing-firm")).await;

        assert!(matches!(result, Err(LibraryError::Database(_))));
    }

    #[tokio::test]
    async fn test_active_count_and_delete() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteOfficeRepository::new();
        let firm = seed_firm(&mut conn, "FRA").await;

        let first = office("0A001", &firm.id);
        let second = office("0A002", &firm.id);
        repo.insert(&mut conn, &first).await.unwrap();
        repo.insert(&mut conn, &second).await.unwrap();
        assert_eq!(repo.count_active_by_firm(&mut conn, &firm.id).await.unwrap(), 2);

        repo.set_active(&mut conn, &first.id, false, 1).await.unwrap();
        assert_eq!(repo.count_active_by_firm(&mut conn, &firm.id).await.unwrap(), 1);

        assert!(repo.delete(&mut conn, &second.id).await.unwrap());
        assert!(!repo.delete(&mut conn, &second.id).await.unwrap());
        assert_eq!(repo.find_all(&mut conn).await.unwrap().len(), 1);
    }
}
