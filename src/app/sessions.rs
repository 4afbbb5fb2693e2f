use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use crate::domain::user::{Session, SessionStore, User};

const TOKEN_BYTES: usize = 32;
/// Upper bound on `SESSION_TTL_HOURS`, one year.
pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 366;

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, ttl_hours: u64) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS) * 60 * 60),
        }
    }

    /// Issues a fresh opaque token for `user` and records its session.
    pub async fn create(&self, user: &User) -> Result<String> {
        let token = generate_token();
        let session = Session {
            user_id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            issued_at: OffsetDateTime::now_utc(),
        };
        self.store.create(&token, &session, self.ttl).await?;
        Ok(token)
    }

    pub async fn authenticate(&self, token: &str) -> Result<Option<Session>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.store.get(token).await
    }

    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.store.delete(token).await
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemorySessionStore;
    use time::macros::date;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            birth_date: date!(1990 - 12 - 10),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let first = generate_token();
        let second = generate_token();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn revoked_token_no_longer_authenticates() {
        let service = SessionService::new(Arc::new(InMemorySessionStore::default()), 24);
        let user = user();

        let token = service.create(&user).await.unwrap();
        let session = service.authenticate(&token).await.unwrap().unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.email, "ada@example.com");

        service.revoke(&token).await.unwrap();
        assert!(service.authenticate(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_ttl_is_capped() {
        let service = SessionService::new(Arc::new(InMemorySessionStore::default()), u64::MAX);
        assert_eq!(service.ttl, Duration::from_secs(MAX_SESSION_TTL_HOURS * 60 * 60));

        let token = service.create(&user()).await.unwrap();
        assert!(service.authenticate(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let service = SessionService::new(Arc::new(InMemorySessionStore::default()), 24);
        assert!(service.authenticate("").await.unwrap().is_none());
    }
}
