use anyhow::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::domain::user::{Session, SessionStore};

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

/// Sessions are keyed by a digest of the token so the raw bearer token
/// never sits in Redis.
fn session_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("session:{}", hex::encode(hasher.finalize()))
}

#[async_trait]
impl SessionStore for RedisCache {
    async fn create(&self, token: &str, session: &Session, ttl: Duration) -> Result<()> {
        let body = serde_json::to_string(session)?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(session_key(token), body, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>> {
        let mut conn = self.connection().await?;
        let body: Option<String> = conn.get(session_key(token)).await?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(session_key(token)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        RedisCache::ping(self).await
    }
}
