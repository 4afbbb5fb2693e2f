use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::movie::{IndicativeRating, Movie, MovieImage, MovieRepository};
use crate::domain::pagination::PageRequest;
use crate::infra::postgres::Db;

#[derive(Clone)]
pub struct PgMovieRepository {
    db: Db,
}

impl PgMovieRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn images_for(&self, movie_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<MovieImage>>> {
        let rows = sqlx::query(
            "SELECT id, movie_id, image_url, storage_id, created_at \
             FROM movie_images WHERE movie_id = ANY($1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(movie_ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut images: HashMap<Uuid, Vec<MovieImage>> = HashMap::new();
        for row in rows {
            let image = MovieImage {
                id: row.get("id"),
                movie_id: row.get("movie_id"),
                image_url: row.get("image_url"),
                storage_id: row.get("storage_id"),
                created_at: row.get("created_at"),
            };
            images.entry(image.movie_id).or_default().push(image);
        }
        Ok(images)
    }
}

const MOVIE_SELECT: &str = "SELECT m.id, m.indicative_rating_id, m.user_id, m.title, m.duration, \
            m.created_at, m.updated_at, \
            r.description AS rating_description, r.image_url AS rating_image_url \
     FROM movies m \
     JOIN indicative_ratings r ON r.id = m.indicative_rating_id";

fn movie_from_row(row: &PgRow) -> Movie {
    let indicative_rating_id: Uuid = row.get("indicative_rating_id");
    Movie {
        id: row.get("id"),
        indicative_rating_id,
        user_id: row.get("user_id"),
        title: row.get("title"),
        duration: row.get("duration"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        indicative_rating: Some(IndicativeRating {
            id: indicative_rating_id,
            description: row.get("rating_description"),
            image_url: row.get("rating_image_url"),
        }),
        images: Vec::new(),
    }
}

fn rating_from_row(row: &PgRow) -> IndicativeRating {
    IndicativeRating {
        id: row.get("id"),
        description: row.get("description"),
        image_url: row.get("image_url"),
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    async fn list_indicative_ratings(&self) -> Result<Vec<IndicativeRating>> {
        let rows = sqlx::query(
            "SELECT id, description, image_url FROM indicative_ratings ORDER BY sort_order ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(rating_from_row).collect())
    }

    async fn get_indicative_rating(&self, id: Uuid) -> Result<Option<IndicativeRating>> {
        let row = sqlx::query("SELECT id, description, image_url FROM indicative_ratings WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(rating_from_row))
    }

    async fn create(&self, movie: &Movie) -> Result<()> {
        sqlx::query(
            "INSERT INTO movies (id, indicative_rating_id, user_id, title, duration, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(movie.id)
        .bind(movie.indicative_rating_id)
        .bind(movie.user_id)
        .bind(&movie.title)
        .bind(movie.duration)
        .bind(movie.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Movie>> {
        let row = sqlx::query(&format!(
            "{} WHERE m.id = $1 AND m.deleted_at IS NULL",
            MOVIE_SELECT
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        let mut movie = match row {
            Some(row) => movie_from_row(&row),
            None => return Ok(None),
        };

        let mut images = self.images_for(&[movie.id]).await?;
        movie.images = images.remove(&movie.id).unwrap_or_default();
        Ok(Some(movie))
    }

    async fn list_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<(Vec<Movie>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM movies WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE m.user_id = $1 AND m.deleted_at IS NULL \
             ORDER BY {} \
             LIMIT $2 OFFSET $3",
            MOVIE_SELECT,
            page.sort.as_sql("m", "title")
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.db.pool())
        .await?;

        let mut movies: Vec<Movie> = rows.iter().map(movie_from_row).collect();
        if movies.is_empty() {
            return Ok((movies, total));
        }

        let ids: Vec<Uuid> = movies.iter().map(|movie| movie.id).collect();
        let mut images = self.images_for(&ids).await?;
        for movie in &mut movies {
            movie.images = images.remove(&movie.id).unwrap_or_default();
        }

        Ok((movies, total))
    }

    async fn update(&self, movie: &Movie) -> Result<()> {
        sqlx::query(
            "UPDATE movies \
             SET title = $2, duration = $3, indicative_rating_id = $4, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(movie.duration)
        .bind(movie.indicative_rating_id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE movies SET deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_image(&self, image: &MovieImage) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO movie_images (id, movie_id, image_url, storage_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(image.id)
        .bind(image.movie_id)
        .bind(&image.image_url)
        .bind(&image.storage_id)
        .bind(image.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_image_by_storage_id(&self, storage_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM movie_images WHERE storage_id = $1")
            .bind(storage_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
