use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::app::cinemas::CinemaService;
use crate::app::movies::MovieService;
use crate::app::sessions::SessionService;
use crate::app::users::UserService;
use crate::domain::cinema::{Cinema, CinemaPayload};
use crate::domain::movie::{
    ImageFile, ImageLimits, IndicativeRating, MovieForm, MovieResponse, MovieUpdatePayload,
};
use crate::domain::pagination::{Page, PageQuery, PageRequest};
use crate::domain::user::{SignInPayload, SignInResponse, User, UserPayload};
use crate::domain::validation::ValidationErrors;
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(
        state.users.clone(),
        SessionService::new(state.sessions.clone(), state.session_ttl_hours),
    )
}

fn movie_service(state: &AppState) -> MovieService {
    MovieService::new(state.movies.clone(), state.images.clone(), state.queue.clone())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected json payload");
            Err(AppError::validation(ValidationErrors::single(
                "payload",
                "Invalid JSON payload",
            )))
        }
    }
}

fn path_id(path: Result<Path<Uuid>, PathRejection>, field: &str) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::validation(ValidationErrors::single(field, "Must be a valid UUID")))
}

fn page_request(
    query: Result<Query<PageQuery>, QueryRejection>,
    alphabetical_sort: &str,
) -> Result<PageRequest, AppError> {
    let Query(query) = query.map_err(|_| {
        AppError::validation(ValidationErrors::single("query", "Invalid pagination parameters"))
    })?;
    Ok(PageRequest::from_query(query, alphabetical_sort)?)
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.users.ping().await.is_ok();
    let redis = state.sessions.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let mut payload = json_body(payload)?;
    payload.validate()?;

    let user = user_service(&state)
        .create(payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create user"))?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInPayload>, JsonRejection>,
) -> Result<Json<SignInResponse>, AppError> {
    let mut payload = json_body(payload)?;
    payload.validate()?;

    let token = user_service(&state)
        .sign_in(&payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to sign in"))?;

    Ok(Json(SignInResponse { token }))
}

pub async fn sign_out(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    user_service(&state)
        .sign_out(&auth.token)
        .await
        .map_err(|err| AppError::from_service(err, "failed to sign out"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = user_service(&state)
        .me(auth.user_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to load current user"))?;

    Ok(Json(user))
}

pub async fn create_cinema(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CinemaPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Cinema>), AppError> {
    let mut payload = json_body(payload)?;
    payload.validate()?;

    let cinema = CinemaService::new(state.cinemas.clone())
        .create(auth.user_id, payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create cinema"))?;

    Ok((StatusCode::CREATED, Json(cinema)))
}

pub async fn list_cinemas(
    auth: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<Cinema>>, AppError> {
    let page = page_request(query, "name_asc")?;

    let cinemas = CinemaService::new(state.cinemas.clone())
        .list(auth.user_id, page)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list cinemas"))?;

    Ok(Json(cinemas))
}

pub async fn get_cinema(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Cinema>, AppError> {
    let id = path_id(path, "cinemaId")?;

    let cinema = CinemaService::new(state.cinemas.clone())
        .get(auth.user_id, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch cinema"))?;

    Ok(Json(cinema))
}

pub async fn delete_cinema(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = path_id(path, "cinemaId")?;

    CinemaService::new(state.cinemas.clone())
        .delete(auth.user_id, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete cinema"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_indicative_ratings(
    State(state): State<AppState>,
) -> Result<Json<Vec<IndicativeRating>>, AppError> {
    let ratings = movie_service(&state)
        .list_indicative_ratings()
        .await
        .map_err(|err| AppError::from_service(err, "failed to list indicative ratings"))?;

    Ok(Json(ratings))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::payload_too_large("request body is too large");
    }
    tracing::warn!(error = %err.body_text(), "rejected multipart payload");
    AppError::validation(ValidationErrors::single(
        "payload",
        "Invalid multipart payload",
    ))
}

async fn read_movie_form(mut multipart: Multipart) -> Result<MovieForm, AppError> {
    let mut form = MovieForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "duration" => form.duration = Some(field.text().await.map_err(multipart_error)?),
            "indicativeRatingId" => {
                form.indicative_rating_id = Some(field.text().await.map_err(multipart_error)?)
            }
            "images" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.images.push(ImageFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn create_movie(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Result<(StatusCode, Json<MovieResponse>), AppError> {
    let multipart = multipart.map_err(|_| {
        AppError::validation(ValidationErrors::single(
            "payload",
            "Expected a multipart/form-data body",
        ))
    })?;
    let form = read_movie_form(multipart).await?;
    let payload = form.into_payload(ImageLimits {
        max_images: state.max_images_per_movie,
        max_bytes: state.upload_max_bytes,
    })?;

    let movie = movie_service(&state)
        .create(auth.user_id, payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create movie"))?;

    Ok((StatusCode::CREATED, Json(MovieResponse::from(movie))))
}

pub async fn list_movies(
    auth: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<MovieResponse>>, AppError> {
    let page = page_request(query, "title_asc")?;

    let movies = movie_service(&state)
        .list(auth.user_id, page)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list movies"))?;

    Ok(Json(movies.map(MovieResponse::from)))
}

pub async fn get_movie(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MovieResponse>, AppError> {
    let id = path_id(path, "movieId")?;

    let movie = movie_service(&state)
        .get(auth.user_id, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch movie"))?;

    Ok(Json(MovieResponse::from(movie)))
}

pub async fn update_movie(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MovieUpdatePayload>, JsonRejection>,
) -> Result<Json<MovieResponse>, AppError> {
    let id = path_id(path, "movieId")?;
    let mut payload = json_body(payload)?;
    payload.validate()?;

    let movie = movie_service(&state)
        .update(auth.user_id, id, payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update movie"))?;

    Ok(Json(MovieResponse::from(movie)))
}

pub async fn delete_movie(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = path_id(path, "movieId")?;

    movie_service(&state)
        .delete(auth.user_id, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete movie"))?;

    Ok(StatusCode::NO_CONTENT)
}
