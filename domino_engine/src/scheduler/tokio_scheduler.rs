//! In-process scheduler backed by tokio timers.
//!
//! Fired tasks are delivered over an mpsc channel; the server runs a
//! dispatcher loop that feeds them back into the engine's callback handlers,
//! playing the role the external task queue plays in production.

use log::{debug, info};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::{FiredTask, SchedulerResult, TaskId, TaskKind, TaskPayload, TaskScheduler};
use async_trait::async_trait;

pub struct TokioScheduler {
    pending: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    tx: mpsc::UnboundedSender<FiredTask>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiving end of its fired-task channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: Mutex::new(HashMap::new()),
                tx,
            },
            rx,
        )
    }

    /// Number of tasks that have neither fired nor been cancelled.
    pub async fn pending_count(&self) -> usize {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, handle| !handle.is_finished());
        pending.len()
    }
}

#[async_trait]
impl TaskScheduler for TokioScheduler {
    async fn schedule(
        &self,
        kind: TaskKind,
        payload: TaskPayload,
        delay_secs: u64,
    ) -> SchedulerResult<TaskId> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let tx = self.tx.clone();
        let fired = FiredTask { kind, payload };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            // Receiver gone means the server is shutting down.
            let _ = tx.send(fired);
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|_, handle| !handle.is_finished());
        pending.insert(task_id.clone(), handle);
        debug!("scheduled {kind:?} task {task_id} in {delay_secs}s");
        Ok(task_id)
    }

    async fn cancel(&self, task_id: &str) -> SchedulerResult<()> {
        let mut pending = self.pending.lock().await;
        match pending.remove(task_id) {
            Some(handle) => {
                handle.abort();
                debug!("cancelled task {task_id}");
            }
            None => {
                info!("task {task_id} not found for cancellation (already fired or cancelled)");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::GameId;

    fn payload(game_id: &str) -> TaskPayload {
        TaskPayload {
            game_id: GameId::from(game_id),
            expected_player_id: None,
        }
    }

    #[tokio::test]
    async fn fires_after_delay() {
        let (scheduler, mut rx) = TokioScheduler::new();
        scheduler
            .schedule(TaskKind::StartGame, payload("g1"), 0)
            .await
            .unwrap();
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.kind, TaskKind::StartGame);
        assert_eq!(fired.payload.game_id, "g1");
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let (scheduler, mut rx) = TokioScheduler::new();
        let id = scheduler
            .schedule(TaskKind::TurnTimeout, payload("g1"), 60)
            .await
            .unwrap();
        scheduler.cancel(&id).await.unwrap();
        assert_eq!(scheduler.pending_count().await, 0);
        // Nothing buffered.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancelling_unknown_task_is_ok() {
        let (scheduler, _rx) = TokioScheduler::new();
        assert!(scheduler.cancel("no-such-task").await.is_ok());
    }
}
