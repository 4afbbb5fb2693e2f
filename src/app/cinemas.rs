use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::cinema::{Cinema, CinemaPayload, CinemaRepository};
use crate::domain::pagination::{Page, PageRequest};

#[derive(Clone)]
pub struct CinemaService {
    cinemas: Arc<dyn CinemaRepository>,
}

impl CinemaService {
    pub fn new(cinemas: Arc<dyn CinemaRepository>) -> Self {
        Self { cinemas }
    }

    pub async fn create(&self, user_id: Uuid, payload: CinemaPayload) -> ServiceResult<Cinema> {
        let cinema = payload.into_cinema(user_id);
        self.cinemas.create(&cinema).await?;
        info!(cinema_id = %cinema.id, user_id = %user_id, "cinema created");
        Ok(cinema)
    }

    pub async fn list(&self, user_id: Uuid, page: PageRequest) -> ServiceResult<Page<Cinema>> {
        let (items, total) = self.cinemas.list_by_user(user_id, &page).await?;
        Ok(Page::new(items, &page, total))
    }

    /// Cinemas of other users are reported as missing.
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Cinema> {
        match self.cinemas.get_by_id(id).await? {
            Some(cinema) if cinema.user_id == user_id => Ok(cinema),
            _ => Err(ServiceError::CinemaNotFound),
        }
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> ServiceResult<()> {
        if !self.cinemas.delete(id, user_id).await? {
            return Err(ServiceError::CinemaNotFound);
        }
        info!(cinema_id = %id, user_id = %user_id, "cinema deleted");
        Ok(())
    }
}
