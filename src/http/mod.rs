use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let movies = routes::movies(state.upload_max_bytes, state.max_images_per_movie);
    Router::new()
        .merge(routes::health())
        .merge(routes::users())
        .merge(routes::cinemas())
        .merge(movies)
        .with_state(state)
}
