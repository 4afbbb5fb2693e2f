use anyhow::anyhow;
use bytes::Bytes;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::imaging::{convert_to_jpeg, JPEG_CONTENT_TYPE};
use crate::domain::movie::{
    image_object_key, ImageFile, ImageStore, IndicativeRating, Movie, MovieImage, MoviePayload,
    MovieRepository, MovieUpdatePayload,
};
use crate::domain::pagination::{Page, PageRequest};
use crate::domain::task::{DeleteImageTask, ImageTask, TaskQueue, UploadImageTask};

/// What became of an upload task once it was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Stored,
    /// The row already existed from an earlier delivery.
    AlreadyStored,
    /// The movie was deleted before the task ran.
    MovieGone,
}

#[derive(Clone)]
pub struct MovieService {
    movies: Arc<dyn MovieRepository>,
    images: Arc<dyn ImageStore>,
    queue: Arc<dyn TaskQueue>,
}

impl MovieService {
    pub fn new(
        movies: Arc<dyn MovieRepository>,
        images: Arc<dyn ImageStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            movies,
            images,
            queue,
        }
    }

    pub async fn list_indicative_ratings(&self) -> ServiceResult<Vec<IndicativeRating>> {
        let ratings = self.movies.list_indicative_ratings().await?;
        if ratings.is_empty() {
            return Err(ServiceError::IndicativeRatingsNotFound);
        }
        Ok(ratings)
    }

    /// Writes the movie row, then hands each image to the worker. Images
    /// that fail to convert or enqueue are logged and left out; the movie
    /// is still created.
    pub async fn create(&self, user_id: Uuid, payload: MoviePayload) -> ServiceResult<Movie> {
        let rating = self
            .movies
            .get_indicative_rating(payload.indicative_rating_id)
            .await?
            .ok_or(ServiceError::IndicativeRatingNotFound)?;

        let mut movie = payload.to_movie(user_id);
        self.movies.create(&movie).await?;
        movie.indicative_rating = Some(rating);
        info!(movie_id = %movie.id, user_id = %user_id, "movie created");

        let mut enqueued = 0;
        for (index, file) in payload.images.into_iter().enumerate() {
            let image = match convert_upload(file).await {
                Ok(image) => image,
                Err(err) => {
                    warn!(error = ?err, movie_id = %movie.id, index, "skipping image that failed conversion");
                    continue;
                }
            };

            let task = ImageTask::Upload(UploadImageTask {
                image_id: Uuid::new_v4(),
                movie_id: movie.id,
                user_id,
                image,
            });
            match self.queue.enqueue(task).await {
                Ok(task_id) => {
                    enqueued += 1;
                    info!(task_id = %task_id, movie_id = %movie.id, "image upload queued");
                }
                Err(err) => {
                    error!(error = ?err, movie_id = %movie.id, index, "failed to enqueue image upload");
                }
            }
        }
        info!(movie_id = %movie.id, enqueued, "movie images queued");

        Ok(movie)
    }

    pub async fn list(&self, user_id: Uuid, page: PageRequest) -> ServiceResult<Page<Movie>> {
        let (items, total) = self.movies.list_by_user(user_id, &page).await?;
        Ok(Page::new(items, &page, total))
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Movie> {
        self.owned(user_id, id).await
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: MovieUpdatePayload,
    ) -> ServiceResult<Movie> {
        let mut movie = self.owned(user_id, id).await?;
        if payload.is_empty() {
            return Ok(movie);
        }

        if let Some(rating_id) = payload.indicative_rating_id {
            self.movies
                .get_indicative_rating(rating_id)
                .await?
                .ok_or(ServiceError::IndicativeRatingNotFound)?;
            movie.indicative_rating_id = rating_id;
        }
        if let Some(title) = payload.title {
            movie.title = title;
        }
        if let Some(duration) = payload.duration {
            movie.duration = duration;
        }

        self.movies.update(&movie).await?;
        info!(movie_id = %movie.id, user_id = %user_id, "movie updated");

        self.movies
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::MovieNotFound)
    }

    /// Queues removal of every stored image, then soft-deletes the movie.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> ServiceResult<()> {
        let movie = self.owned(user_id, id).await?;

        for image in &movie.images {
            let task = ImageTask::Delete(DeleteImageTask {
                storage_id: image.storage_id.clone(),
            });
            if let Err(err) = self.queue.enqueue(task).await {
                error!(
                    error = ?err,
                    movie_id = %movie.id,
                    storage_id = %image.storage_id,
                    "failed to enqueue image delete"
                );
            }
        }

        if !self.movies.soft_delete(movie.id).await? {
            return Err(ServiceError::MovieNotFound);
        }
        info!(movie_id = %movie.id, user_id = %user_id, images = movie.images.len(), "movie deleted");
        Ok(())
    }

    /// Safe to run more than once for the same task: the object key and the
    /// row id are both fixed by the task.
    pub async fn process_upload(&self, task: &UploadImageTask) -> anyhow::Result<UploadOutcome> {
        if self.movies.get_by_id(task.movie_id).await?.is_none() {
            info!(movie_id = %task.movie_id, image_id = %task.image_id, "movie gone, dropping image upload");
            return Ok(UploadOutcome::MovieGone);
        }

        let key = image_object_key(task.movie_id, task.image_id);
        let stored = self
            .images
            .upload(Bytes::from(task.image.clone()), &key, JPEG_CONTENT_TYPE)
            .await?;

        let created = self
            .movies
            .create_image(&MovieImage {
                id: task.image_id,
                movie_id: task.movie_id,
                image_url: stored.url,
                storage_id: stored.id,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        if created {
            info!(movie_id = %task.movie_id, image_id = %task.image_id, "movie image stored");
            Ok(UploadOutcome::Stored)
        } else {
            Ok(UploadOutcome::AlreadyStored)
        }
    }

    pub async fn process_delete(&self, task: &DeleteImageTask) -> anyhow::Result<()> {
        self.images.delete(&task.storage_id).await?;
        let removed = self
            .movies
            .delete_image_by_storage_id(&task.storage_id)
            .await?;
        info!(storage_id = %task.storage_id, removed, "movie image deleted");
        Ok(())
    }

    async fn owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Movie> {
        let movie = self
            .movies
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::MovieNotFound)?;
        if movie.user_id != user_id {
            warn!(movie_id = %id, user_id = %user_id, "movie access by non-owner");
            return Err(ServiceError::MovieNotOwned);
        }
        Ok(movie)
    }
}

async fn convert_upload(file: ImageFile) -> anyhow::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || convert_to_jpeg(&file.bytes))
        .await
        .map_err(|err| anyhow!("image conversion task failed: {}", err))?
}
