//! Office assignment repository
//!
//! Assignments are written by the user module. Sync only needs to know
//! whether an office has any, and to drop them when an office changes firm.

use crate::error::Result;
use crate::models::OfficeAssignment;
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection};

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Record that `assignment.user_id` works from `assignment.office_id`.
    /// Re-assigning an existing pair is a no-op.
    async fn assign(&self, conn: &mut SqliteConnection, assignment: &OfficeAssignment)
        -> Result<()>;

    async fn find_by_office(
        &self,
        conn: &mut SqliteConnection,
        office_id: &str,
    ) -> Result<Vec<OfficeAssignment>>;

    async fn count_by_office(&self, conn: &mut SqliteConnection, office_id: &str) -> Result<i64>;

    /// Remove every assignment to an office.
    ///
    /// # Returns
    /// Number of assignments removed
    async fn delete_by_office(&self, conn: &mut SqliteConnection, office_id: &str) -> Result<u64>;
}

#[derive(Debug, Clone, Default)]
pub struct SqliteAssignmentRepository;

impl SqliteAssignmentRepository {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_id: String,
    office_id: String,
    assigned_at: i64,
}

impl From<AssignmentRow> for OfficeAssignment {
    fn from(row: AssignmentRow) -> Self {
        OfficeAssignment {
            user_id: row.user_id,
            office_id: row.office_id,
            assigned_at: row.assigned_at,
        }
    }
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    async fn assign(
        &self,
        conn: &mut SqliteConnection,
        assignment: &OfficeAssignment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO office_assignments (user_id, office_id, assigned_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, office_id) DO NOTHING
            "#,
        )
        .bind(&assignment.user_id)
        .bind(&assignment.office_id)
        .bind(assignment.assigned_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_office(
        &self,
        conn: &mut SqliteConnection,
        office_id: &str,
    ) -> Result<Vec<OfficeAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT user_id, office_id, assigned_at
            FROM office_assignments
            WHERE office_id = ?
            ORDER BY user_id
            "#,
        )
        .bind(office_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(OfficeAssignment::from).collect())
    }

    async fn count_by_office(&self, conn: &mut SqliteConnection, office_id: &str) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM office_assignments WHERE office_id = ?")
                .bind(office_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(count.0)
    }

    async fn delete_by_office(&self, conn: &mut SqliteConnection, office_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM office_assignments WHERE office_id = ?")
            .bind(office_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Address, Firm, FirmType, Office};
    use crate::repositories::{
        FirmRepository, OfficeRepository, SqliteFirmRepository, SqliteOfficeRepository,
    };

    #[tokio::test]
    async fn test_assign_count_and_clear() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let firm = Firm::new("FRA".into(), "Firm A".into(), FirmType::Advocate, 0);
        SqliteFirmRepository::new().insert(&mut conn, &firm).await.unwrap();
        let office = Office::new("0A001".into(), firm.id.clone(), Address::default(), 0);
        SqliteOfficeRepository::new()
            .insert(&mut conn, &office)
            .await
            .unwrap();

        let repo = SqliteAssignmentRepository::new();
        for user in ["user-1", "user-2", "user-1"] {
            repo.assign(
                &mut conn,
                &OfficeAssignment {
                    user_id: user.to_string(),
                    office_id: office.id.clone(),
                    assigned_at: 10,
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(repo.count_by_office(&mut conn, &office.id).await.unwrap(), 2);
        let found = repo.find_by_office(&mut conn, &office.id).await.unwrap();
        assert_eq!(found[0].user_id, "user-1");

        assert_eq!(repo.delete_by_office(&mut conn, &office.id).await.unwrap(), 2);
        assert_eq!(repo.count_by_office(&mut conn, &office.id).await.unwrap(), 0);
    }
}
