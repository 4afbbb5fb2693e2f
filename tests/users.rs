//! User Tests
//!
//! Covers registration, sign-in, sign-out and the current-user profile.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use moviepass::app::sessions::SessionService;
use moviepass::domain::user::User;
use serde_json::{json, Value};
use time::macros::date;
use time::OffsetDateTime;
use uuid::Uuid;

fn registration(email: &str) -> Value {
    json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "email": email,
        "confirmEmail": email,
        "password": "Str0ng!pass",
        "confirmPassword": "Str0ng!pass",
        "birthDate": "1990-12-09T00:00:00Z"
    })
}

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn signup_valid_data() {
    let app = app();

    let resp = app
        .post_json("/v1/users", registration("grace@example.com"), None)
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert!(body["id"].is_string());
    assert_eq!(body["firstName"], "Grace");
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["birthDate"], "1990-12-09");
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password_hash").is_none());
    assert_eq!(app.backends.users.len(), 1);
}

#[tokio::test]
async fn signup_normalizes_email() {
    let app = app();
    let mut payload = registration("Grace@Example.com");
    payload["email"] = json!("  Grace@Example.com ");

    let resp = app.post_json("/v1/users", payload, None).await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["email"], "grace@example.com");
}

#[tokio::test]
async fn signup_duplicate_email_makes_no_write() {
    let app = app();
    let existing = app.create_user("dupemail").await;
    let writes_before = app.backends.users.writes();

    let resp = app
        .post_json("/v1/users", registration(&existing.email), None)
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "email is already registered");
    assert_eq!(app.backends.users.writes(), writes_before);
    assert_eq!(app.backends.users.len(), 1);
}

#[tokio::test]
async fn signup_reports_every_invalid_field() {
    let app = app();

    let resp = app
        .post_json(
            "/v1/users",
            json!({
                "firstName": " ",
                "lastName": "Hopper",
                "email": "not-an-email",
                "confirmEmail": "other@example.com",
                "password": "weak",
                "confirmPassword": "weaker",
                "birthDate": "2999-01-01T00:00:00Z"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = resp.error_fields();
    for field in [
        "firstName",
        "email",
        "confirmEmail",
        "password",
        "confirmPassword",
        "birthDate",
    ] {
        assert!(fields.iter().any(|f| f == field), "missing {field}: {fields:?}");
    }
    assert!(app.backends.users.is_empty());
}

#[tokio::test]
async fn signup_rejects_age_over_limit() {
    let app = app();
    let mut payload = registration("old@example.com");
    payload["birthDate"] = json!("1700-01-01T00:00:00Z");

    let resp = app.post_json("/v1/users", payload, None).await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        resp.json()["errors"][0]["message"],
        "The date of birth indicates an age greater than the allowed maximum of 200 years"
    );
}

#[tokio::test]
async fn signup_malformed_json_is_unprocessable() {
    let app = app();

    let resp = app
        .post_json("/v1/users", json!({ "firstName": "Grace" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.error_fields(), vec!["payload".to_string()]);
}

// ===========================================================================
// Sign-in / sign-out
// ===========================================================================

#[tokio::test]
async fn sign_in_returns_working_token() {
    let app = app();
    let user = app.create_user("signin").await;

    let resp = app
        .post_json(
            "/v1/users/sign-in",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let token = resp.json()["token"].as_str().unwrap().to_string();
    assert_ne!(token, user.token);

    let me = app.get("/v1/users/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["id"], user.id.to_string());
}

#[tokio::test]
async fn sign_in_wrong_password_and_unknown_email_look_the_same() {
    let app = app();
    let user = app.create_user("creds").await;

    let wrong_password = app
        .post_json(
            "/v1/users/sign-in",
            json!({ "email": user.email, "password": "Wr0ng!password" }),
            None,
        )
        .await;
    let unknown_email = app
        .post_json(
            "/v1/users/sign-in",
            json!({ "email": "nobody@example.com", "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.json(), unknown_email.json());
}

#[tokio::test]
async fn sign_in_requires_valid_fields() {
    let app = app();

    let resp = app
        .post_json("/v1/users/sign-in", json!({ "email": "bad" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.error_fields(), vec!["email", "password"]);
}

#[tokio::test]
async fn sign_out_revokes_the_session() {
    let app = app();
    let user = app.create_user("signout").await;

    let resp = app
        .post_json("/v1/users/sign-out", json!({}), Some(&user.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let me = app.get("/v1/users/me", Some(&user.token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert!(app.backends.sessions.is_empty());
}

// ===========================================================================
// Current user
// ===========================================================================

#[tokio::test]
async fn me_requires_authentication() {
    let app = app();

    let missing = app.get("/v1/users/me", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_message(), "missing Authorization header");

    let unknown = app.get("/v1/users/me", Some("not-a-session")).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_with_session_for_missing_account_is_unauthorized() {
    let app = app();
    let orphan = User {
        id: Uuid::new_v4(),
        first_name: "Gone".to_string(),
        last_name: "User".to_string(),
        email: "gone@example.com".to_string(),
        password_hash: String::new(),
        birth_date: date!(1990 - 01 - 15),
        created_at: OffsetDateTime::now_utc(),
        updated_at: None,
    };
    let token = SessionService::new(app.state.sessions.clone(), 24)
        .create(&orphan)
        .await
        .unwrap();

    let resp = app.get("/v1/users/me", Some(&token)).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "account no longer exists");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();

    let resp = app.get("/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
