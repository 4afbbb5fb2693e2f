use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::sessions::SessionService;
use crate::http::AppError;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let service = SessionService::new(state.sessions.clone(), state.session_ttl_hours);
        let session = service.authenticate(token).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to look up session");
            AppError::internal()
        })?;

        let session = session.ok_or_else(|| AppError::unauthorized("invalid or expired session"))?;
        Ok(AuthUser {
            user_id: session.user_id,
            token: token.to_string(),
        })
    }
}
