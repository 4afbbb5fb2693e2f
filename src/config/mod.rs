use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

use crate::app::sessions::MAX_SESSION_TTL_HOURS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub redis_url: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_public_url: String,
    pub queue_name: String,
    pub task_max_attempts: u32,
    pub queue_poll_wait_seconds: u64,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub session_ttl_hours: u64,
    pub upload_max_bytes: usize,
    pub max_images_per_movie: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let s3_endpoint = env_or_err("S3_ENDPOINT")?;
        let s3_bucket = env_or_err("S3_BUCKET")?;
        let s3_public_url = std::env::var("S3_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/{}/", s3_endpoint.trim_end_matches('/'), s3_bucket)
        });

        let task_max_attempts: u32 = env_or_parse("TASK_MAX_ATTEMPTS", "5")?;
        if task_max_attempts == 0 {
            return Err(anyhow!("invalid TASK_MAX_ATTEMPTS: must be at least 1"));
        }

        let session_ttl_hours: u64 = env_or_parse("SESSION_TTL_HOURS", "24")?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(anyhow!(
                "invalid SESSION_TTL_HOURS: must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            ));
        }

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            s3_endpoint,
            s3_region: env_or("S3_REGION", "us-east-1"),
            s3_bucket,
            s3_public_url,
            queue_name: env_or("QUEUE_NAME", "moviepass:movie-images"),
            task_max_attempts,
            queue_poll_wait_seconds: env_or_parse("QUEUE_POLL_WAIT_SECONDS", "5")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            session_ttl_hours,
            upload_max_bytes: env_or_parse("UPLOAD_MAX_BYTES", "10485760")?,
            max_images_per_movie: env_or_parse("MAX_IMAGES_PER_MOVIE", "5")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
