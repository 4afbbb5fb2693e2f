use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::sessions::SessionService;
use crate::domain::user::{SignInPayload, User, UserPayload, UserRepository};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: SessionService,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, sessions: SessionService) -> Self {
        Self { users, sessions }
    }

    /// Registers a user from a payload that already passed validation.
    pub async fn create(&self, payload: UserPayload) -> ServiceResult<User> {
        if self.users.get_by_email(&payload.email).await?.is_some() {
            warn!(email = %payload.email, "email already registered");
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password(&payload.password)?;
        let user = payload.into_user(password_hash);
        // A concurrent registration can still win the unique index.
        if !self.users.create(&user).await? {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn sign_in(&self, payload: &SignInPayload) -> ServiceResult<String> {
        let user = match self.users.get_by_email(&payload.email).await? {
            Some(user) => user,
            None => {
                // Same argon2 cost as a wrong password.
                verify_password(&payload.password, dummy_hash()?)?;
                return Err(ServiceError::UserNotFound);
            }
        };

        if !verify_password(&payload.password, &user.password_hash)? {
            warn!(user_id = %user.id, "sign-in with wrong password");
            return Err(ServiceError::InvalidPassword);
        }

        let token = self.sessions.create(&user).await?;
        info!(user_id = %user.id, "user signed in");
        Ok(token)
    }

    pub async fn me(&self, user_id: Uuid) -> ServiceResult<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::AccountGone)
    }

    pub async fn sign_out(&self, token: &str) -> ServiceResult<()> {
        self.sessions.revoke(token).await?;
        Ok(())
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

/// Hash checked when no user matches the email.
fn dummy_hash() -> anyhow::Result<&'static str> {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    if DUMMY_HASH.get().is_none() {
        let _ = DUMMY_HASH.set(hash_password("moviepass-unknown-user")?);
    }
    DUMMY_HASH
        .get()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("dummy password hash unavailable"))
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::{InMemorySessionStore, InMemoryUserRepository};

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("Sup3r$ecret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Sup3r$ecret", &hash).unwrap());
        assert!(!verify_password("sup3r$ecret", &hash).unwrap());
    }

    #[test]
    fn dummy_hash_is_valid_and_stable() {
        let first = dummy_hash().unwrap();
        assert!(first.starts_with("$argon2"));
        assert!(!verify_password("Sup3r$ecret", first).unwrap());
        assert_eq!(dummy_hash().unwrap(), first);
    }

    #[tokio::test]
    async fn unknown_email_is_user_not_found() {
        let service = UserService::new(
            Arc::new(InMemoryUserRepository::default()),
            SessionService::new(Arc::new(InMemorySessionStore::default()), 24),
        );
        let payload = SignInPayload {
            email: "nobody@example.com".to_string(),
            password: "Sup3r$ecret".to_string(),
        };

        let err = service.sign_in(&payload).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }
}
