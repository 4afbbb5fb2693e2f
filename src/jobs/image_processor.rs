use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::app::movies::MovieService;
use crate::domain::task::{ImageTask, ReservedTask, TaskQueue};

const IDLE_SLEEP_MS: u64 = 200;
const ERROR_BACKOFF_MS: u64 = 1000;

/// What the worker did with one reserved task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Completed,
    Retried,
    DeadLettered,
}

#[derive(Clone)]
pub struct ImageWorker {
    movies: MovieService,
    queue: Arc<dyn TaskQueue>,
    max_attempts: u32,
    poll_wait: Duration,
}

impl ImageWorker {
    pub fn new(
        movies: MovieService,
        queue: Arc<dyn TaskQueue>,
        max_attempts: u32,
        poll_wait: Duration,
    ) -> Self {
        Self {
            movies,
            queue,
            max_attempts: max_attempts.max(1),
            poll_wait,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let recovered = self.queue.recover_in_flight().await?;
        if recovered > 0 {
            warn!(recovered, "requeued tasks left in flight by a previous worker");
        }
        info!(max_attempts = self.max_attempts, "image processor started");

        loop {
            match self.process_next().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(IDLE_SLEEP_MS)).await;
                }
                Err(err) => {
                    warn!(error = ?err, "queue operation failed, backing off");
                    tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
                }
            }
        }
    }

    /// Reserves and handles at most one task. `Ok(None)` means the queue
    /// had nothing ready within the poll wait.
    pub async fn process_next(&self) -> Result<Option<DispatchStatus>> {
        let reserved = match self.queue.reserve(self.poll_wait).await? {
            Some(reserved) => reserved,
            None => return Ok(None),
        };

        match self.handle(&reserved).await {
            Ok(()) => {
                self.queue.ack(&reserved).await?;
                Ok(Some(DispatchStatus::Completed))
            }
            Err(err) => self.fail(reserved, err).await.map(Some),
        }
    }

    /// Processes tasks until the queue is empty. Retried tasks are picked up
    /// again in the same call, so a task that always fails ends in the dead
    /// letter list.
    pub async fn drain(&self) -> Result<Vec<DispatchStatus>> {
        let mut statuses = Vec::new();
        while let Some(status) = self.process_next().await? {
            statuses.push(status);
        }
        Ok(statuses)
    }

    async fn handle(&self, reserved: &ReservedTask) -> Result<()> {
        match &reserved.envelope.task {
            ImageTask::Upload(task) => {
                self.movies.process_upload(task).await?;
            }
            ImageTask::Delete(task) => {
                self.movies.process_delete(task).await?;
            }
        }
        Ok(())
    }

    async fn fail(&self, reserved: ReservedTask, err: anyhow::Error) -> Result<DispatchStatus> {
        let task_id = reserved.envelope.id;
        let kind = reserved.envelope.task.kind();
        let attempt = reserved.envelope.attempts + 1;

        if attempt >= self.max_attempts {
            error!(
                error = ?err,
                task_id = %task_id,
                kind,
                attempt,
                "image task exhausted its attempts, moving to dead letter"
            );
            self.queue.dead_letter(reserved).await?;
            Ok(DispatchStatus::DeadLettered)
        } else {
            warn!(error = ?err, task_id = %task_id, kind, attempt, "image task failed, retrying");
            self.queue.retry(reserved).await?;
            Ok(DispatchStatus::Retried)
        }
    }
}
