//! In-memory backends for tests and local experiments.
//!
//! Each type mirrors one of the production adapters closely enough to run
//! the full router and the image worker without Postgres, Redis or S3. The
//! image store and the queue can be told to fail so error paths are
//! reachable from tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::cinema::{Cinema, CinemaRepository};
use crate::domain::movie::{
    ImageStore, IndicativeRating, Movie, MovieImage, MovieRepository, StoredImage,
};
use crate::domain::pagination::{PageRequest, SortOrder};
use crate::domain::task::{ImageTask, ReservedTask, TaskEnvelope, TaskQueue};
use crate::domain::user::{Session, SessionStore, User, UserRepository};
use crate::AppState;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn paginate<T: Clone>(items: Vec<T>, page: &PageRequest) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page_items = items
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit).unwrap_or(0))
        .collect();
    (page_items, total)
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
    writes: AtomicUsize,
}

impl InMemoryUserRepository {
    pub fn len(&self) -> usize {
        lock(&self.users).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of inserts that actually stored a row.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<bool> {
        let mut users = lock(&self.users);
        if users.values().any(|existing| existing.email == user.email) {
            return Ok(false);
        }
        users.insert(user.id, user.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(lock(&self.users)
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(lock(&self.users).get(&id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, (Session, Instant)>>,
}

impl InMemorySessionStore {
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, token: &str, session: &Session, ttl: Duration) -> Result<()> {
        lock(&self.sessions).insert(token.to_string(), (session.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>> {
        let mut sessions = lock(&self.sessions);
        match sessions.get(token) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                sessions.remove(token);
                Ok(None)
            }
            Some((session, _)) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        lock(&self.sessions).remove(token);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCinemaRepository {
    cinemas: Mutex<Vec<Cinema>>,
}

impl InMemoryCinemaRepository {
    pub fn len(&self) -> usize {
        lock(&self.cinemas).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CinemaRepository for InMemoryCinemaRepository {
    async fn create(&self, cinema: &Cinema) -> Result<()> {
        lock(&self.cinemas).push(cinema.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Cinema>> {
        Ok(lock(&self.cinemas)
            .iter()
            .find(|cinema| cinema.id == id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<(Vec<Cinema>, i64)> {
        let mut owned: Vec<Cinema> = lock(&self.cinemas)
            .iter()
            .filter(|cinema| cinema.user_id == user_id)
            .cloned()
            .collect();
        match page.sort {
            SortOrder::Newest => owned.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::Oldest => owned.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Alphabetical => owned.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        Ok(paginate(owned, page))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut cinemas = lock(&self.cinemas);
        let before = cinemas.len();
        cinemas.retain(|cinema| !(cinema.id == id && cinema.user_id == user_id));
        Ok(cinemas.len() < before)
    }
}

#[derive(Default)]
struct MovieTables {
    ratings: Vec<IndicativeRating>,
    movies: Vec<(Movie, bool)>,
    images: Vec<MovieImage>,
}

#[derive(Default)]
pub struct InMemoryMovieRepository {
    tables: Mutex<MovieTables>,
}

impl InMemoryMovieRepository {
    pub fn with_ratings(ratings: Vec<IndicativeRating>) -> Self {
        let repo = Self::default();
        lock(&repo.tables).ratings = ratings;
        repo
    }

    pub fn default_ratings() -> Vec<IndicativeRating> {
        ["L", "10", "12", "14", "16", "18"]
            .iter()
            .map(|description| IndicativeRating {
                id: Uuid::new_v4(),
                description: description.to_string(),
                image_url: format!("https://static.moviepass.local/ratings/{}.png", description.to_lowercase()),
            })
            .collect()
    }

    pub fn ratings(&self) -> Vec<IndicativeRating> {
        lock(&self.tables).ratings.clone()
    }

    /// Live and soft-deleted movies alike.
    pub fn movie_count(&self) -> usize {
        lock(&self.tables).movies.len()
    }

    pub fn is_deleted(&self, id: Uuid) -> Option<bool> {
        lock(&self.tables)
            .movies
            .iter()
            .find(|(movie, _)| movie.id == id)
            .map(|(_, deleted)| *deleted)
    }

    pub fn images(&self) -> Vec<MovieImage> {
        lock(&self.tables).images.clone()
    }

    pub fn images_of(&self, movie_id: Uuid) -> Vec<MovieImage> {
        lock(&self.tables)
            .images
            .iter()
            .filter(|image| image.movie_id == movie_id)
            .cloned()
            .collect()
    }

    fn hydrate(tables: &MovieTables, movie: &Movie) -> Movie {
        let mut movie = movie.clone();
        movie.indicative_rating = tables
            .ratings
            .iter()
            .find(|rating| rating.id == movie.indicative_rating_id)
            .cloned();
        movie.images = tables
            .images
            .iter()
            .filter(|image| image.movie_id == movie.id)
            .cloned()
            .collect();
        movie
    }
}

#[async_trait]
impl MovieRepository for InMemoryMovieRepository {
    async fn list_indicative_ratings(&self) -> Result<Vec<IndicativeRating>> {
        Ok(self.ratings())
    }

    async fn get_indicative_rating(&self, id: Uuid) -> Result<Option<IndicativeRating>> {
        Ok(lock(&self.tables)
            .ratings
            .iter()
            .find(|rating| rating.id == id)
            .cloned())
    }

    async fn create(&self, movie: &Movie) -> Result<()> {
        let mut tables = lock(&self.tables);
        if !tables
            .ratings
            .iter()
            .any(|rating| rating.id == movie.indicative_rating_id)
        {
            return Err(anyhow!("foreign key violation: indicative rating"));
        }
        let mut stored = movie.clone();
        stored.images.clear();
        tables.movies.push((stored, false));
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Movie>> {
        let tables = lock(&self.tables);
        Ok(tables
            .movies
            .iter()
            .find(|(movie, deleted)| movie.id == id && !deleted)
            .map(|(movie, _)| Self::hydrate(&tables, movie)))
    }

    async fn list_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<(Vec<Movie>, i64)> {
        let tables = lock(&self.tables);
        let mut owned: Vec<Movie> = tables
            .movies
            .iter()
            .filter(|(movie, deleted)| movie.user_id == user_id && !deleted)
            .map(|(movie, _)| Self::hydrate(&tables, movie))
            .collect();
        match page.sort {
            SortOrder::Newest => owned.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::Oldest => owned.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Alphabetical => owned.sort_by(|a, b| a.title.cmp(&b.title)),
        }
        Ok(paginate(owned, page))
    }

    async fn update(&self, movie: &Movie) -> Result<()> {
        let mut tables = lock(&self.tables);
        if let Some((stored, _)) = tables
            .movies
            .iter_mut()
            .find(|(stored, deleted)| stored.id == movie.id && !deleted)
        {
            stored.title = movie.title.clone();
            stored.duration = movie.duration;
            stored.indicative_rating_id = movie.indicative_rating_id;
            stored.updated_at = Some(time::OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut tables = lock(&self.tables);
        match tables
            .movies
            .iter_mut()
            .find(|(movie, deleted)| movie.id == id && !deleted)
        {
            Some((_, deleted)) => {
                *deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_image(&self, image: &MovieImage) -> Result<bool> {
        let mut tables = lock(&self.tables);
        if !tables.movies.iter().any(|(movie, _)| movie.id == image.movie_id) {
            return Err(anyhow!("foreign key violation: movie"));
        }
        if tables.images.iter().any(|existing| existing.id == image.id) {
            return Ok(false);
        }
        tables.images.push(image.clone());
        Ok(true)
    }

    async fn delete_image_by_storage_id(&self, storage_id: &str) -> Result<bool> {
        let mut tables = lock(&self.tables);
        let before = tables.images.len();
        tables.images.retain(|image| image.storage_id != storage_id);
        Ok(tables.images.len() < before)
    }
}

/// Object store double that keeps uploads in memory and hands out URLs
/// under `https://images.test/`.
#[derive(Default)]
pub struct MockImageStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    upload_calls: AtomicUsize,
}

pub const MOCK_IMAGE_BASE_URL: &str = "https://images.test/";

impl MockImageStore {
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.objects).contains_key(id)
    }

    pub fn object(&self, id: &str) -> Option<Bytes> {
        lock(&self.objects).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn upload(&self, bytes: Bytes, filename: &str, _content_type: &str) -> Result<StoredImage> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(anyhow!("image store unavailable"));
        }
        lock(&self.objects).insert(filename.to_string(), bytes);
        Ok(StoredImage {
            url: format!("{}{}", MOCK_IMAGE_BASE_URL, filename),
            id: filename.to_string(),
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("image store unavailable"));
        }
        lock(&self.objects).remove(id);
        Ok(())
    }
}

#[derive(Default)]
struct QueueLists {
    ready: VecDeque<String>,
    processing: Vec<String>,
    dead: Vec<String>,
}

/// Same list discipline as the Redis queue: push to the back of `ready`,
/// reserve from the front into `processing`.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    lists: Mutex<QueueLists>,
    fail_enqueue: AtomicBool,
}

impl InMemoryTaskQueue {
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub fn pending(&self) -> Vec<TaskEnvelope> {
        lock(&self.lists)
            .ready
            .iter()
            .filter_map(|raw| TaskEnvelope::decode(raw).ok())
            .collect()
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.lists).processing.len()
    }

    pub fn dead_letters(&self) -> Vec<TaskEnvelope> {
        lock(&self.lists)
            .dead
            .iter()
            .filter_map(|raw| TaskEnvelope::decode(raw).ok())
            .collect()
    }

    /// Pushes an arbitrary payload, e.g. one that does not decode.
    pub fn push_raw(&self, raw: &str) {
        lock(&self.lists).ready.push_back(raw.to_string());
    }

    fn remove_in_flight(lists: &mut QueueLists, raw: &str) {
        if let Some(index) = lists.processing.iter().position(|item| item == raw) {
            lists.processing.remove(index);
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: ImageTask) -> Result<Uuid> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(anyhow!("queue unavailable"));
        }
        let envelope = TaskEnvelope::new(task);
        lock(&self.lists).ready.push_back(envelope.encode()?);
        Ok(envelope.id)
    }

    async fn reserve(&self, _wait: Duration) -> Result<Option<ReservedTask>> {
        let mut lists = lock(&self.lists);
        while let Some(raw) = lists.ready.pop_front() {
            match TaskEnvelope::decode(&raw) {
                Ok(envelope) => {
                    lists.processing.push(raw.clone());
                    return Ok(Some(ReservedTask { envelope, raw }));
                }
                Err(_) => lists.dead.push(raw),
            }
        }
        Ok(None)
    }

    async fn ack(&self, task: &ReservedTask) -> Result<()> {
        Self::remove_in_flight(&mut lock(&self.lists), &task.raw);
        Ok(())
    }

    async fn retry(&self, task: ReservedTask) -> Result<()> {
        let mut envelope = task.envelope;
        envelope.attempts += 1;
        let mut lists = lock(&self.lists);
        Self::remove_in_flight(&mut lists, &task.raw);
        lists.ready.push_back(envelope.encode()?);
        Ok(())
    }

    async fn dead_letter(&self, task: ReservedTask) -> Result<()> {
        let mut envelope = task.envelope;
        envelope.attempts += 1;
        let mut lists = lock(&self.lists);
        Self::remove_in_flight(&mut lists, &task.raw);
        lists.dead.push(envelope.encode()?);
        Ok(())
    }

    async fn recover_in_flight(&self) -> Result<usize> {
        let mut lists = lock(&self.lists);
        let in_flight: Vec<String> = lists.processing.drain(..).collect();
        let recovered = in_flight.len();
        for raw in in_flight.into_iter().rev() {
            lists.ready.push_front(raw);
        }
        Ok(recovered)
    }

    async fn len(&self) -> Result<usize> {
        Ok(lock(&self.lists).ready.len())
    }

    async fn dead_letter_len(&self) -> Result<usize> {
        Ok(lock(&self.lists).dead.len())
    }
}

/// Every backend the application needs, kept as concrete types so tests
/// can inspect and steer them.
pub struct InMemoryBackends {
    pub users: Arc<InMemoryUserRepository>,
    pub sessions: Arc<InMemorySessionStore>,
    pub cinemas: Arc<InMemoryCinemaRepository>,
    pub movies: Arc<InMemoryMovieRepository>,
    pub images: Arc<MockImageStore>,
    pub queue: Arc<InMemoryTaskQueue>,
}

impl Default for InMemoryBackends {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackends {
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            sessions: Arc::new(InMemorySessionStore::default()),
            cinemas: Arc::new(InMemoryCinemaRepository::default()),
            movies: Arc::new(InMemoryMovieRepository::with_ratings(
                InMemoryMovieRepository::default_ratings(),
            )),
            images: Arc::new(MockImageStore::default()),
            queue: Arc::new(InMemoryTaskQueue::default()),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            users: self.users.clone(),
            cinemas: self.cinemas.clone(),
            movies: self.movies.clone(),
            sessions: self.sessions.clone(),
            images: self.images.clone(),
            queue: self.queue.clone(),
            session_ttl_hours: 24,
            upload_max_bytes: 10 * 1024 * 1024,
            max_images_per_movie: 5,
        }
    }
}
