use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadImageTask {
    /// Pre-allocated id of the `MovieImage` row, also used in the object key.
    pub image_id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteImageTask {
    pub storage_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageTask {
    Upload(UploadImageTask),
    Delete(DeleteImageTask),
}

impl ImageTask {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload(_) => "upload",
            Self::Delete(_) => "delete",
        }
    }
}

/// Wire format of a queued task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub attempts: u32,
    pub task: ImageTask,
}

impl TaskEnvelope {
    pub fn new(task: ImageTask) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempts: 0,
            task,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A task moved to the in-flight list. `raw` is the exact payload stored
/// there and is what `ack`, `retry` and `dead_letter` remove.
#[derive(Debug, Clone)]
pub struct ReservedTask {
    pub envelope: TaskEnvelope,
    pub raw: String,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: ImageTask) -> Result<Uuid>;
    /// Waits up to `wait` for a task and moves it in flight. A zero wait
    /// polls once. Payloads that do not decode are dead-lettered and
    /// skipped, so `None` always means the queue had nothing ready.
    async fn reserve(&self, wait: Duration) -> Result<Option<ReservedTask>>;
    async fn ack(&self, task: &ReservedTask) -> Result<()>;
    /// Puts the task back at the tail of the queue with its attempt count
    /// incremented.
    async fn retry(&self, task: ReservedTask) -> Result<()>;
    async fn dead_letter(&self, task: ReservedTask) -> Result<()>;
    /// Moves every in-flight task back to the queue. Returns how many moved.
    async fn recover_in_flight(&self) -> Result<usize>;
    async fn len(&self) -> Result<usize>;
    async fn dead_letter_len(&self) -> Result<usize>;
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
