//! Delayed-task scheduler port.
//!
//! The engine never sleeps in-process: every turn timer and start delay is a
//! task handed to an external scheduler, which calls back into the engine
//! when due. Cancellation is best-effort — a task may fire after being
//! cancelled, so every fired callback re-validates game state before acting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::entities::{GameId, UserId};

pub mod tokio_scheduler;

pub use tokio_scheduler::TokioScheduler;

/// Opaque id issued by the scheduler for later cancellation.
pub type TaskId = String;

/// Which callback a task fires into.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Start-delay or next-round trigger.
    StartGame,
    /// Turn-timeout trigger for a specific expected player.
    TurnTimeout,
}

/// Payload carried by a scheduled task and delivered back on firing.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TaskPayload {
    pub game_id: GameId,
    pub expected_player_id: Option<UserId>,
}

/// A task that has come due.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FiredTask {
    pub kind: TaskKind,
    pub payload: TaskPayload,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task queue not found: {0}")]
    QueueNotFound(String),

    #[error("scheduler permission denied: {0}")]
    PermissionDenied(String),

    #[error("scheduler backend error: {0}")]
    Backend(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Port to the external delayed-task service.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Arm a callback at `now + delay_secs`.
    async fn schedule(
        &self,
        kind: TaskKind,
        payload: TaskPayload,
        delay_secs: u64,
    ) -> SchedulerResult<TaskId>;

    /// Cancel a pending task. A task that already fired (or was never known)
    /// is not an error.
    async fn cancel(&self, task_id: &str) -> SchedulerResult<()>;
}
