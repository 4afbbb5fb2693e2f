use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::pagination::PageRequest;
use crate::domain::validation::{check_length, ValidationErrors, REQUIRED};

pub const MAX_TITLE_LEN: usize = 255;
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone)]
pub struct Movie {
    pub id: Uuid,
    pub indicative_rating_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub duration: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    pub indicative_rating: Option<IndicativeRating>,
    pub images: Vec<MovieImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieImage {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub image_url: String,
    /// Identifier of the object in the remote image store.
    pub storage_id: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicativeRating {
    pub id: Uuid,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieResponse {
    pub id: Uuid,
    pub title: String,
    pub duration: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicative_rating: Option<IndicativeRating>,
    pub movie_images: Vec<MovieImageResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieImageResponse {
    pub id: Uuid,
    pub image_url: String,
}

impl From<Movie> for MovieResponse {
    fn from(movie: Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            duration: movie.duration,
            indicative_rating: movie.indicative_rating,
            movie_images: movie
                .images
                .into_iter()
                .map(|image| MovieImageResponse {
                    id: image.id,
                    image_url: image.image_url,
                })
                .collect(),
        }
    }
}

/// An image file received with a movie form, before conversion.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Raw multipart fields of a movie creation request.
#[derive(Debug, Default)]
pub struct MovieForm {
    pub title: Option<String>,
    pub duration: Option<String>,
    pub indicative_rating_id: Option<String>,
    pub images: Vec<ImageFile>,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageLimits {
    pub max_images: usize,
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct MoviePayload {
    pub title: String,
    pub duration: i32,
    pub indicative_rating_id: Uuid,
    pub images: Vec<ImageFile>,
}

impl MovieForm {
    pub fn into_payload(self, limits: ImageLimits) -> Result<MoviePayload, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self.title.unwrap_or_default().trim().to_string();
        check_length(&mut errors, "title", &title, MAX_TITLE_LEN);

        let duration = match self.duration.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("duration", REQUIRED);
                0
            }
            Some(raw) => match raw.parse::<i32>() {
                Ok(value) if value > 0 => value,
                Ok(_) => {
                    errors.add("duration", "Must be greater than 0");
                    0
                }
                Err(_) => {
                    errors.add("duration", "Must be a whole number of minutes");
                    0
                }
            },
        };

        let indicative_rating_id = match self.indicative_rating_id.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("indicativeRatingId", REQUIRED);
                Uuid::nil()
            }
            Some(raw) => Uuid::parse_str(raw).unwrap_or_else(|_| {
                errors.add("indicativeRatingId", "Must be a valid UUID");
                Uuid::nil()
            }),
        };

        validate_images(&mut errors, &self.images, limits);

        errors.into_result()?;
        Ok(MoviePayload {
            title,
            duration,
            indicative_rating_id,
            images: self.images,
        })
    }
}

fn validate_images(errors: &mut ValidationErrors, images: &[ImageFile], limits: ImageLimits) {
    if images.len() > limits.max_images {
        errors.add(
            "images",
            format!("At most {} images are allowed", limits.max_images),
        );
        return;
    }
    for image in images {
        if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
            errors.add("images", "Only JPEG, PNG and WebP images are allowed");
            return;
        }
        if image.bytes.is_empty() {
            errors.add("images", "Images cannot be empty");
            return;
        }
        if image.bytes.len() > limits.max_bytes {
            errors.add(
                "images",
                format!("Each image must be at most {} bytes", limits.max_bytes),
            );
            return;
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieUpdatePayload {
    pub title: Option<String>,
    pub duration: Option<i32>,
    pub indicative_rating_id: Option<Uuid>,
}

impl MovieUpdatePayload {
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = self.title.as_mut() {
            *title = title.trim().to_string();
            check_length(&mut errors, "title", title, MAX_TITLE_LEN);
        }
        if let Some(duration) = self.duration {
            if duration <= 0 {
                errors.add("duration", "Must be greater than 0");
            }
        }
        errors.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.duration.is_none() && self.indicative_rating_id.is_none()
    }
}

impl MoviePayload {
    pub fn to_movie(&self, user_id: Uuid) -> Movie {
        Movie {
            id: Uuid::new_v4(),
            indicative_rating_id: self.indicative_rating_id,
            user_id,
            title: self.title.clone(),
            duration: self.duration,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
            indicative_rating: None,
            images: Vec::new(),
        }
    }
}

/// Result of storing an object in the remote image store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub id: String,
}

#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn list_indicative_ratings(&self) -> Result<Vec<IndicativeRating>>;
    async fn get_indicative_rating(&self, id: Uuid) -> Result<Option<IndicativeRating>>;
    async fn create(&self, movie: &Movie) -> Result<()>;
    /// Loads a live (not deleted) movie with its rating and images.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Movie>>;
    async fn list_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<(Vec<Movie>, i64)>;
    async fn update(&self, movie: &Movie) -> Result<()>;
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
    /// Returns `false` if a row with the same id already exists.
    async fn create_image(&self, image: &MovieImage) -> Result<bool>;
    async fn delete_image_by_storage_id(&self, storage_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, bytes: Bytes, filename: &str, content_type: &str) -> Result<StoredImage>;
    /// Deleting an object that no longer exists succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}

pub fn image_object_key(movie_id: Uuid, image_id: Uuid) -> String {
    format!("movies/{}/{}.jpg", movie_id, image_id)
}
