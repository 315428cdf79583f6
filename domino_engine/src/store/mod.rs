//! Transactional document store port.
//!
//! The engine holds no authoritative state between invocations. Every
//! operation rehydrates a [`GameSnapshot`], computes the next state as pure
//! data, and commits a batch of typed [`Mutation`]s guarded by the versions
//! it read. A guard mismatch aborts the batch with [`StoreError::Conflict`]
//! and the engine retries — the store transaction is the lock.

use async_trait::async_trait;
use thiserror::Error;

use crate::game::entities::{
    ActiveGameRef, EntryTransaction, GameId, GameInstance, PayoutRecord, PlayerSlot, TemplateId,
    TournamentTemplate, UserId, UserProfile,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A game document, its player slots, and the version the pair was read at.
#[derive(Clone, Debug)]
pub struct GameSnapshot {
    pub game: GameInstance,
    pub players: Vec<PlayerSlot>,
    pub version: u64,
}

impl GameSnapshot {
    #[must_use]
    pub fn player(&self, user_id: &str) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    /// Optimistic guard for commits derived from this snapshot.
    #[must_use]
    pub fn guard(&self) -> VersionGuard {
        VersionGuard {
            game_id: self.game.id.clone(),
            version: self.version,
        }
    }
}

/// Version a game document must still be at for a commit to apply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionGuard {
    pub game_id: GameId,
    pub version: u64,
}

/// Pending write, collected during compute and applied atomically at commit.
#[derive(Clone, Debug)]
pub enum Mutation {
    PutTemplate(TournamentTemplate),
    DeleteTemplate(TemplateId),
    PutGame(GameInstance),
    /// Deletes the game document and all of its player slots.
    DeleteGame(GameId),
    PutPlayer { game_id: GameId, slot: PlayerSlot },
    DeletePlayer { game_id: GameId, user_id: UserId },
    /// Append to a user's active games unless the game is already listed.
    /// Applied read-modify-write inside the commit, so concurrent commits
    /// editing the same profile cannot clobber each other's entries.
    AddActiveGame { user_id: UserId, game: ActiveGameRef },
    /// Drop a game from a user's active games. Same in-commit contract as
    /// [`Mutation::AddActiveGame`].
    RemoveActiveGame { user_id: UserId, game_id: GameId },
    PutPayout(PayoutRecord),
    PutTransaction(EntryTransaction),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write conflict on game {0}")]
    Conflict(GameId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Port to the transactional document store.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn get_template(&self, template_id: &str) -> StoreResult<Option<TournamentTemplate>>;

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;

    async fn load_game(&self, game_id: &str) -> StoreResult<Option<GameSnapshot>>;

    /// Waiting tables for a template, oldest first.
    async fn find_waiting_games(&self, template_id: &str) -> StoreResult<Vec<GameSnapshot>>;

    /// Every table referencing a template, for cascading deletion.
    async fn list_games_for_template(&self, template_id: &str) -> StoreResult<Vec<GameSnapshot>>;

    async fn get_payout(&self, game_id: &str) -> StoreResult<Option<PayoutRecord>>;

    /// Apply `mutations` atomically iff every guard still matches.
    async fn commit(&self, guards: &[VersionGuard], mutations: Vec<Mutation>) -> StoreResult<()>;
}
