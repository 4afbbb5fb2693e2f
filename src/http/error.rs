use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::ServiceError;
use crate::domain::validation::{FieldError, ValidationErrors};

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    errors: Vec<FieldError>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "validation failed".to_string(),
            errors: errors.into_inner(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    /// The detail of an internal failure is logged, never returned.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    /// Maps a service failure, logging infrastructure errors with `context`.
    pub fn from_service(err: ServiceError, context: &'static str) -> Self {
        match err {
            ServiceError::EmailAlreadyRegistered => Self::conflict("email is already registered"),
            ServiceError::UserNotFound | ServiceError::InvalidPassword => {
                Self::unauthorized("invalid email or password")
            }
            ServiceError::AccountGone => Self::unauthorized("account no longer exists"),
            ServiceError::CinemaNotFound => Self::not_found("cinema not found"),
            ServiceError::MovieNotFound => Self::not_found("movie not found"),
            ServiceError::MovieNotOwned => Self::forbidden("movie belongs to another user"),
            ServiceError::IndicativeRatingNotFound => {
                Self::not_found("indicative rating not found")
            }
            ServiceError::IndicativeRatingsNotFound => {
                Self::not_found("no indicative ratings available")
            }
            ServiceError::Internal(err) => {
                tracing::error!(error = ?err, "{}", context);
                Self::internal()
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            errors: self.errors,
        });
        (self.status, body).into_response()
    }
}
