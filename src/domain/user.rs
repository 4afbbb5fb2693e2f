use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::validation::{
    check_length, is_strong_password, is_valid_email, ValidationErrors, REQUIRED,
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_AGE_YEARS: i32 = 200;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(with = "iso_date")]
    pub birth_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Server-side state kept for an issued session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub confirm_email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(with = "time::serde::rfc3339")]
    pub birth_date: OffsetDateTime,
}

impl UserPayload {
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        self.validate_at(OffsetDateTime::now_utc().date())
    }

    pub fn validate_at(&mut self, today: Date) -> Result<(), ValidationErrors> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.confirm_email = self.confirm_email.trim().to_lowercase();

        let mut errors = ValidationErrors::new();
        check_length(&mut errors, "firstName", &self.first_name, MAX_NAME_LEN);
        check_length(&mut errors, "lastName", &self.last_name, MAX_NAME_LEN);

        if self.email.is_empty() {
            errors.add("email", REQUIRED);
        } else if !is_valid_email(&self.email) {
            errors.add("email", "Invalid email format");
        }
        if self.confirm_email != self.email {
            errors.add("confirmEmail", "Emails do not match");
        }

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        } else if self.password.len() > MAX_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at most {} characters", MAX_PASSWORD_LEN),
            );
        } else if !is_strong_password(&self.password) {
            errors.add(
                "password",
                "Password must be at least 8 characters long, contain an uppercase letter, a number, and a special character",
            );
        }
        if self.confirm_password != self.password {
            errors.add("confirmPassword", "Passwords do not match");
        }

        let birth_date = self.birth_date.date();
        if birth_date > today {
            errors.add("birthDate", "The date of birth cannot be in the future");
        } else if age_in_years(birth_date, today) > MAX_AGE_YEARS {
            errors.add(
                "birthDate",
                format!(
                    "The date of birth indicates an age greater than the allowed maximum of {} years",
                    MAX_AGE_YEARS
                ),
            );
        }

        errors.into_result()
    }

    pub fn into_user(self, password_hash: String) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash,
            birth_date: self.birth_date.date(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignInPayload {
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        self.email = self.email.trim().to_lowercase();

        let mut errors = ValidationErrors::new();
        if self.email.is_empty() {
            errors.add("email", REQUIRED);
        } else if !is_valid_email(&self.email) {
            errors.add("email", "Invalid email format");
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        } else if self.password.len() > MAX_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at most {} characters", MAX_PASSWORD_LEN),
            );
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInResponse {
    pub token: String,
}

fn age_in_years(birth_date: Date, today: Date) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month() as u8, today.day()) < (birth_date.month() as u8, birth_date.day()) {
        age -= 1;
    }
    age
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns `false` when the email is already taken.
    async fn create(&self, user: &User) -> Result<bool>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, token: &str, session: &Session, ttl: Duration) -> Result<()>;
    async fn get(&self, token: &str) -> Result<Option<Session>>;
    async fn delete(&self, token: &str) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn payload(birth_date: OffsetDateTime) -> UserPayload {
        UserPayload {
            first_name: " Grace ".to_string(),
            last_name: "Hopper".to_string(),
            email: "Grace@Example.com".to_string(),
            confirm_email: "grace@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
            confirm_password: "Str0ng!pass".to_string(),
            birth_date,
        }
    }

    #[test]
    fn valid_payload_is_normalized() {
        let mut payload = payload(datetime!(1990-12-09 0:00 UTC));
        payload.validate_at(date!(2024 - 06 - 01)).unwrap();
        assert_eq!(payload.first_name, "Grace");
        assert_eq!(payload.email, "grace@example.com");
    }

    #[test]
    fn age_limit_counts_whole_years() {
        let today = date!(2024 - 06 - 01);

        let mut exactly_200 = payload(datetime!(1823-06-02 0:00 UTC));
        assert!(exactly_200.validate_at(today).is_ok());

        let mut over_200 = payload(datetime!(1823-06-01 0:00 UTC));
        let errors = over_200.validate_at(today).unwrap_err();
        assert_eq!(errors.fields(), vec!["birthDate"]);
    }

    #[test]
    fn future_birth_date_is_rejected() {
        let mut payload = payload(datetime!(2024-06-02 0:00 UTC));
        let errors = payload.validate_at(date!(2024 - 06 - 01)).unwrap_err();
        assert_eq!(errors.fields(), vec!["birthDate"]);
    }

    #[test]
    fn password_needs_every_character_class() {
        for weak in ["Sh0rt!", "nouppercase1!", "NoDigits!!", "NoSpecial12"] {
            let mut payload = payload(datetime!(1990-12-09 0:00 UTC));
            payload.password = weak.to_string();
            payload.confirm_password = weak.to_string();
            let errors = payload.validate_at(date!(2024 - 06 - 01)).unwrap_err();
            assert_eq!(errors.fields(), vec!["password"], "{}", weak);
        }
    }
}
