use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

/// Room for the text fields and multipart framing on top of the images.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(handlers::create_user))
        .route("/v1/users/sign-in", post(handlers::sign_in))
        .route("/v1/users/sign-out", post(handlers::sign_out))
        .route("/v1/users/me", get(handlers::get_current_user))
}

pub fn cinemas() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/cinemas",
            post(handlers::create_cinema).get(handlers::list_cinemas),
        )
        .route(
            "/v1/cinemas/:cinemaId",
            get(handlers::get_cinema).delete(handlers::delete_cinema),
        )
}

pub fn movies(upload_max_bytes: usize, max_images: usize) -> Router<AppState> {
    let body_limit = upload_max_bytes
        .saturating_mul(max_images.max(1))
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/v1/admin/movies",
            post(handlers::create_movie).get(handlers::list_movies),
        )
        .route(
            "/v1/admin/movies/indicative-rating",
            get(handlers::list_indicative_ratings),
        )
        .route(
            "/v1/admin/movies/:movieId",
            get(handlers::get_movie)
                .patch(handlers::update_movie)
                .delete(handlers::delete_movie),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}
