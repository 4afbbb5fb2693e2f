use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::pagination::PageRequest;
use crate::domain::validation::{check_length, ValidationErrors, REQUIRED};

pub const MAX_CINEMA_NAME_LEN: usize = 255;
pub const MAX_CINEMA_LOCATION_LEN: usize = 255;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cinema {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub location: String,
    pub capacity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CinemaPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub capacity: Option<i32>,
}

impl CinemaPayload {
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        self.name = self.name.trim().to_string();
        self.location = self.location.trim().to_string();

        let mut errors = ValidationErrors::new();
        check_length(&mut errors, "name", &self.name, MAX_CINEMA_NAME_LEN);
        check_length(&mut errors, "location", &self.location, MAX_CINEMA_LOCATION_LEN);
        match self.capacity {
            None => errors.add("capacity", REQUIRED),
            Some(capacity) if capacity <= 0 => errors.add("capacity", "Must be greater than 0"),
            Some(_) => {}
        }
        errors.into_result()
    }

    pub fn into_cinema(self, user_id: Uuid) -> Cinema {
        Cinema {
            id: Uuid::new_v4(),
            user_id,
            name: self.name,
            location: self.location,
            capacity: self.capacity.unwrap_or_default(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }
}

#[async_trait]
pub trait CinemaRepository: Send + Sync {
    async fn create(&self, cinema: &Cinema) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Cinema>>;
    /// Returns one page of the user's cinemas plus the total row count.
    async fn list_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<(Vec<Cinema>, i64)>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool>;
}
