use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::cinema::{Cinema, CinemaRepository};
use crate::domain::pagination::PageRequest;
use crate::infra::postgres::Db;

#[derive(Clone)]
pub struct PgCinemaRepository {
    db: Db,
}

impl PgCinemaRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn cinema_from_row(row: &PgRow) -> Cinema {
    Cinema {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        location: row.get("location"),
        capacity: row.get("capacity"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CinemaRepository for PgCinemaRepository {
    async fn create(&self, cinema: &Cinema) -> Result<()> {
        sqlx::query(
            "INSERT INTO cinemas (id, user_id, name, location, capacity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(cinema.id)
        .bind(cinema.user_id)
        .bind(&cinema.name)
        .bind(&cinema.location)
        .bind(cinema.capacity)
        .bind(cinema.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Cinema>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, location, capacity, created_at, updated_at \
             FROM cinemas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(cinema_from_row))
    }

    async fn list_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<(Vec<Cinema>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cinemas WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT id, user_id, name, location, capacity, created_at, updated_at \
             FROM cinemas c WHERE user_id = $1 \
             ORDER BY {} \
             LIMIT $2 OFFSET $3",
            page.sort.as_sql("c", "name")
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok((rows.iter().map(cinema_from_row).collect(), total))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cinemas WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
