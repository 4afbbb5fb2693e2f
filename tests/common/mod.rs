#![allow(dead_code)]

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::Value;
use std::io::Cursor;
use std::time::Duration;
use time::macros::date;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use moviepass::app::sessions::SessionService;
use moviepass::domain::user::{User, UserRepository};
use moviepass::infra::memory::InMemoryBackends;
use moviepass::jobs::image_processor::{DispatchStatus, ImageWorker};
use moviepass::AppState;

pub const DEFAULT_PASSWORD: &str = "Sup3r$ecret";
pub const TASK_MAX_ATTEMPTS: u32 = 3;
const BOUNDARY: &str = "moviepass-test-boundary";

// ---------------------------------------------------------------------------
// TestApp: one fresh set of in-memory backends per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub backends: InMemoryBackends,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    /// Field names listed in a validation error body.
    pub fn error_fields(&self) -> Vec<String> {
        self.json()["errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|err| err["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub fn app() -> TestApp {
    TestApp::new()
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

impl TestApp {
    pub fn new() -> Self {
        let backends = InMemoryBackends::new();
        let state = backends.state();
        let router = moviepass::http::router(state.clone());
        Self {
            router,
            state,
            backends,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, Some(body), token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, None, token).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        parts: Vec<Part<'_>>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = builder.body(Body::from(multipart_body(parts))).unwrap();
        self.send(request).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Stores a user straight in the repository and opens a session for it.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let email = format!("test_{}@example.com", suffix);
        let user = User {
            id: Uuid::new_v4(),
            first_name: "Test".to_string(),
            last_name: format!("User {}", suffix),
            email: email.clone(),
            password_hash: cheap_hash(DEFAULT_PASSWORD),
            birth_date: date!(1990 - 01 - 15),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        assert!(self.backends.users.create(&user).await.unwrap());

        let token = SessionService::new(self.state.sessions.clone(), 24)
            .create(&user)
            .await
            .expect("session create failed");

        TestUser {
            id: user.id,
            email,
            token,
        }
    }

    pub fn rating_id(&self) -> Uuid {
        self.backends.movies.ratings()[0].id
    }

    /// Creates a movie through the API and returns its id.
    pub async fn create_movie(&self, user: &TestUser, title: &str, images: usize) -> Uuid {
        let rating_id = self.rating_id().to_string();
        let mut parts = vec![
            Part::Text("title", title),
            Part::Text("duration", "120"),
            Part::Text("indicativeRatingId", &rating_id),
        ];
        for index in 0..images {
            parts.push(Part::File {
                name: "images",
                file_name: "poster.png",
                content_type: "image/png",
                bytes: png_bytes(8 + index as u32, 6),
            });
        }

        let resp = self
            .post_multipart("/v1/admin/movies", parts, Some(&user.token))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.json());
        Uuid::parse_str(resp.json()["id"].as_str().unwrap()).unwrap()
    }

    pub fn worker(&self) -> ImageWorker {
        self.state.image_worker(TASK_MAX_ATTEMPTS, Duration::ZERO)
    }

    pub async fn drain_queue(&self) -> Vec<DispatchStatus> {
        self.worker().drain().await.expect("drain failed")
    }
}

/// Low-cost argon2 parameters; verification reads them from the hash.
fn cheap_hash(password: &str) -> String {
    let params = Params::new(8, 1, 1, None).expect("argon2 params");
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .expect("password hash failed")
        .to_string()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([30u8, 120, 200]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("png encode failed");
    out
}

fn multipart_body(parts: Vec<Part<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
