use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::task::{ImageTask, ReservedTask, TaskEnvelope, TaskQueue};
use crate::infra::cache::RedisCache;

/// Task queue on three Redis lists: `{name}` holds ready tasks (pushed on
/// the left, taken from the right), `{name}:processing` holds tasks a worker
/// has reserved but not acknowledged, `{name}:dead` holds tasks that ran
/// out of attempts or could not be decoded.
#[derive(Clone)]
pub struct RedisTaskQueue {
    cache: RedisCache,
    ready: String,
    processing: String,
    dead: String,
}

impl RedisTaskQueue {
    pub fn new(cache: RedisCache, name: &str) -> Self {
        Self {
            cache,
            ready: name.to_string(),
            processing: format!("{}:processing", name),
            dead: format!("{}:dead", name),
        }
    }

    async fn move_in_flight(&self, raw: &str, target: &str, replacement: &str) -> Result<()> {
        let mut conn = self.cache.connection().await?;
        redis::pipe()
            .atomic()
            .lrem(&self.processing, 1, raw)
            .ignore()
            .lpush(target, replacement)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: ImageTask) -> Result<Uuid> {
        let envelope = TaskEnvelope::new(task);
        let raw = envelope.encode()?;
        let mut conn = self.cache.connection().await?;
        conn.lpush::<_, _, ()>(&self.ready, raw).await?;
        debug!(task_id = %envelope.id, kind = envelope.task.kind(), "enqueued image task");
        Ok(envelope.id)
    }

    async fn reserve(&self, wait: Duration) -> Result<Option<ReservedTask>> {
        let mut conn = self.cache.connection().await?;
        loop {
            let raw: Option<String> = if wait.is_zero() {
                redis::cmd("LMOVE")
                    .arg(&self.ready)
                    .arg(&self.processing)
                    .arg("RIGHT")
                    .arg("LEFT")
                    .query_async(&mut conn)
                    .await?
            } else {
                redis::cmd("BLMOVE")
                    .arg(&self.ready)
                    .arg(&self.processing)
                    .arg("RIGHT")
                    .arg("LEFT")
                    .arg(wait.as_secs_f64())
                    .query_async(&mut conn)
                    .await?
            };

            let raw = match raw {
                Some(raw) => raw,
                None => return Ok(None),
            };

            match TaskEnvelope::decode(&raw) {
                Ok(envelope) => {
                    debug!(task_id = %envelope.id, attempts = envelope.attempts, "reserved image task");
                    return Ok(Some(ReservedTask { envelope, raw }));
                }
                Err(err) => {
                    // Skip to the next message; an empty result means an empty queue.
                    warn!(error = ?err, "failed to parse queued task, moving to dead letter");
                    self.move_in_flight(&raw, &self.dead, &raw).await?;
                }
            }
        }
    }

    async fn ack(&self, task: &ReservedTask) -> Result<()> {
        let mut conn = self.cache.connection().await?;
        conn.lrem::<_, _, ()>(&self.processing, 1, &task.raw).await?;
        Ok(())
    }

    async fn retry(&self, task: ReservedTask) -> Result<()> {
        let mut envelope = task.envelope;
        envelope.attempts += 1;
        self.move_in_flight(&task.raw, &self.ready, &envelope.encode()?)
            .await
    }

    async fn dead_letter(&self, task: ReservedTask) -> Result<()> {
        let mut envelope = task.envelope;
        envelope.attempts += 1;
        self.move_in_flight(&task.raw, &self.dead, &envelope.encode()?)
            .await
    }

    async fn recover_in_flight(&self) -> Result<usize> {
        let mut conn = self.cache.connection().await?;
        let mut recovered = 0;
        loop {
            // Newest first, so the oldest ends up nearest the consuming end.
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing)
                .arg(&self.ready)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.cache.connection().await?;
        Ok(conn.llen(&self.ready).await?)
    }

    async fn dead_letter_len(&self) -> Result<usize> {
        let mut conn = self.cache.connection().await?;
        Ok(conn.llen(&self.dead).await?)
    }
}
