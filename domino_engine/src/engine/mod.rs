//! Transactional engine orchestration.
//!
//! Every operation follows the same shape: rehydrate a snapshot, compute the
//! next state as pure data, and commit under the snapshot's version guard,
//! retrying the whole operation on conflict. Scheduler and ledger side
//! effects run strictly after the commit and are compensated or logged on
//! failure; the staleness checks in the callbacks make leftover tasks
//! harmless.

pub mod callbacks;
pub mod matchmaking;
pub mod play;
pub mod settlement;
pub mod templates;

pub use matchmaking::{EntryReceipt, RefundReceipt};
pub use play::{ActionReceipt, ReadyReceipt};
pub use templates::{NewTemplate, TemplateDeletion};

use log::{debug, warn};
use std::sync::Arc;

use crate::config::DominoConfig;
use crate::errors::{EngineError, EngineResult};
use crate::game::entities::{GameStatus, TournamentTemplate, UserProfile};
use crate::ledger::BalanceLedger;
use crate::scheduler::{TaskKind, TaskPayload, TaskScheduler};
use crate::store::{GameSnapshot, GameStore, Mutation, StoreError, VersionGuard};

/// Rehydrate-and-commit attempts before an operation reports the conflict.
const MAX_TXN_ATTEMPTS: usize = 5;

/// The tournament engine: pure game logic wired to the store, ledger, and
/// scheduler ports.
pub struct DominoEngine {
    store: Arc<dyn GameStore>,
    ledger: Arc<dyn BalanceLedger>,
    scheduler: Arc<dyn TaskScheduler>,
    config: DominoConfig,
}

impl DominoEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn GameStore>,
        ledger: Arc<dyn BalanceLedger>,
        scheduler: Arc<dyn TaskScheduler>,
        config: DominoConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            scheduler,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DominoConfig {
        &self.config
    }

    pub(crate) async fn require_template(
        &self,
        template_id: &str,
    ) -> EngineResult<TournamentTemplate> {
        self.store
            .get_template(template_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound(template_id.to_string()))
    }

    pub(crate) async fn require_user(&self, user_id: &str) -> EngineResult<UserProfile> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
    }

    pub(crate) async fn require_game(&self, game_id: &str) -> EngineResult<GameSnapshot> {
        self.store
            .load_game(game_id)
            .await?
            .ok_or_else(|| EngineError::GameNotFound(game_id.to_string()))
    }

    /// Commit under `guards`; `Ok(false)` on a version conflict so the
    /// caller can rehydrate and retry.
    pub(crate) async fn try_commit(
        &self,
        guards: &[VersionGuard],
        mutations: Vec<Mutation>,
    ) -> EngineResult<bool> {
        match self.store.commit(guards, mutations).await {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(game_id)) => {
                debug!("commit conflict on game {game_id}; retrying");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn conflict(game_id: &str) -> EngineError {
        EngineError::Store(StoreError::Conflict(game_id.to_string()))
    }

    /// Best-effort task cancellation for post-commit cleanup.
    pub(crate) async fn cancel_task(&self, task_id: Option<&str>) {
        if let Some(task_id) = task_id {
            if let Err(err) = self.scheduler.cancel(task_id).await {
                warn!("failed to cancel task {task_id}: {err}");
            }
        }
    }

    /// Arm a start-delay (or next-round) task and persist its id with a
    /// follow-up guarded commit. A guard failure means another writer moved
    /// the game on, so the task is cancelled instead.
    pub(crate) async fn arm_start_task(
        &self,
        game_id: &str,
        delay_secs: u64,
        expected_status: GameStatus,
    ) -> EngineResult<()> {
        let Some(snapshot) = self.store.load_game(game_id).await? else {
            return Ok(());
        };
        if snapshot.game.status != expected_status || snapshot.game.scheduled_start_id.is_some() {
            return Ok(());
        }

        let task_id = self
            .scheduler
            .schedule(
                TaskKind::StartGame,
                TaskPayload {
                    game_id: game_id.to_string(),
                    expected_player_id: None,
                },
                delay_secs,
            )
            .await?;

        let mut game = snapshot.game.clone();
        game.scheduled_start_id = Some(task_id.clone());
        if !self
            .try_commit(&[snapshot.guard()], vec![Mutation::PutGame(game)])
            .await?
        {
            self.cancel_task(Some(&task_id)).await;
        }
        Ok(())
    }

    /// Arm the turn timer for `expected_player` and persist its id. Same
    /// guard-or-cancel contract as [`Self::arm_start_task`].
    pub(crate) async fn arm_turn_timer(
        &self,
        game_id: &str,
        expected_player: &str,
        delay_secs: u64,
    ) -> EngineResult<()> {
        let Some(snapshot) = self.store.load_game(game_id).await? else {
            return Ok(());
        };
        if snapshot.game.status != GameStatus::Playing
            || snapshot.game.current_turn.as_deref() != Some(expected_player)
        {
            return Ok(());
        }

        let task_id = self
            .scheduler
            .schedule(
                TaskKind::TurnTimeout,
                TaskPayload {
                    game_id: game_id.to_string(),
                    expected_player_id: Some(expected_player.to_string()),
                },
                delay_secs,
            )
            .await?;

        let mut game = snapshot.game.clone();
        game.scheduled_timer_id = Some(task_id.clone());
        if !self
            .try_commit(&[snapshot.guard()], vec![Mutation::PutGame(game)])
            .await?
        {
            self.cancel_task(Some(&task_id)).await;
        }
        Ok(())
    }
}
