pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::app::movies::MovieService;
use crate::config::AppConfig;
use crate::domain::cinema::CinemaRepository;
use crate::domain::movie::{ImageStore, MovieRepository};
use crate::domain::task::TaskQueue;
use crate::domain::user::{SessionStore, UserRepository};
use crate::infra::cache::RedisCache;
use crate::infra::postgres::{Db, PgCinemaRepository, PgMovieRepository, PgUserRepository};
use crate::infra::queue::RedisTaskQueue;
use crate::infra::storage::ObjectStorage;
use crate::jobs::image_processor::ImageWorker;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub cinemas: Arc<dyn CinemaRepository>,
    pub movies: Arc<dyn MovieRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub images: Arc<dyn ImageStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub session_ttl_hours: u64,
    pub upload_max_bytes: usize,
    pub max_images_per_movie: usize,
}

impl AppState {
    /// Connects to Postgres, Redis and the object store, applying pending
    /// migrations first.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let db = Db::connect(config).await?;
        db.migrate().await?;
        let cache = RedisCache::connect(&config.redis_url).await?;
        let storage = ObjectStorage::new(config).await?;
        let queue = RedisTaskQueue::new(cache.clone(), &config.queue_name);

        Ok(Self {
            users: Arc::new(PgUserRepository::new(db.clone())),
            cinemas: Arc::new(PgCinemaRepository::new(db.clone())),
            movies: Arc::new(PgMovieRepository::new(db)),
            sessions: Arc::new(cache),
            images: Arc::new(storage),
            queue: Arc::new(queue),
            session_ttl_hours: config.session_ttl_hours,
            upload_max_bytes: config.upload_max_bytes,
            max_images_per_movie: config.max_images_per_movie,
        })
    }

    pub fn image_worker(&self, max_attempts: u32, poll_wait: Duration) -> ImageWorker {
        let movies = MovieService::new(self.movies.clone(), self.images.clone(), self.queue.clone());
        ImageWorker::new(movies, self.queue.clone(), max_attempts, poll_wait)
    }
}
