//! Postgres-backed document store.
//!
//! Documents are stored as JSON text alongside the few columns the queries
//! filter on. The optimistic version column on `domino_games` backs the
//! commit guards: a commit locks the guarded rows, compares versions, and
//! aborts with [`StoreError::Conflict`] on any mismatch.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

use super::{GameSnapshot, GameStore, Mutation, StoreError, StoreResult, VersionGuard};
use crate::game::entities::{
    GameInstance, GameStatus, PayoutRecord, PlayerSlot, TournamentTemplate, UserProfile,
};

#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create the backing tables if missing.
    pub async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domino_templates (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domino_users (
                user_id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domino_games (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                version BIGINT NOT NULL DEFAULT 0,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domino_players (
                game_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                joined_at TIMESTAMPTZ NOT NULL,
                doc TEXT NOT NULL,
                PRIMARY KEY (game_id, user_id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domino_payouts (
                game_id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS domino_transactions (
                id TEXT PRIMARY KEY,
                at TIMESTAMPTZ NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn players_of(&self, game_id: &str) -> StoreResult<Vec<PlayerSlot>> {
        let rows = sqlx::query(
            "SELECT doc FROM domino_players WHERE game_id = $1 ORDER BY joined_at",
        )
        .bind(game_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter()
            .map(|row| Ok(serde_json::from_str(row.get::<String, _>("doc").as_str())?))
            .collect()
    }

    async fn snapshot_of_row(&self, row: &sqlx::postgres::PgRow) -> StoreResult<GameSnapshot> {
        let game: GameInstance = serde_json::from_str(row.get::<String, _>("doc").as_str())?;
        let players = self.players_of(&game.id).await?;
        let version: i64 = row.get("version");
        Ok(GameSnapshot {
            game,
            players,
            version: version as u64,
        })
    }

    async fn apply(
        tx: &mut Transaction<'_, Postgres>,
        mutation: Mutation,
        touched: &mut Vec<String>,
    ) -> StoreResult<()> {
        match mutation {
            Mutation::PutTemplate(template) => {
                sqlx::query(
                    r#"
                    INSERT INTO domino_templates (id, doc) VALUES ($1, $2)
                    ON CONFLICT (id) DO UPDATE SET doc = $2
                    "#,
                )
                .bind(&template.id)
                .bind(serde_json::to_string(&template)?)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::DeleteTemplate(template_id) => {
                sqlx::query("DELETE FROM domino_templates WHERE id = $1")
                    .bind(&template_id)
                    .execute(&mut **tx)
                    .await?;
            }
            Mutation::PutGame(game) => {
                touched.push(game.id.clone());
                sqlx::query(
                    r#"
                    INSERT INTO domino_games (id, template_id, status, created_at, version, doc)
                    VALUES ($1, $2, $3, $4, 0, $5)
                    ON CONFLICT (id)
                    DO UPDATE SET template_id = $2, status = $3, created_at = $4, doc = $5
                    "#,
                )
                .bind(&game.id)
                .bind(&game.template_id)
                .bind(status_key(game.status))
                .bind(game.created_at)
                .bind(serde_json::to_string(&game)?)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::DeleteGame(game_id) => {
                sqlx::query("DELETE FROM domino_players WHERE game_id = $1")
                    .bind(&game_id)
                    .execute(&mut **tx)
                    .await?;
                sqlx::query("DELETE FROM domino_games WHERE id = $1")
                    .bind(&game_id)
                    .execute(&mut **tx)
                    .await?;
            }
            Mutation::PutPlayer { game_id, slot } => {
                touched.push(game_id.clone());
                sqlx::query(
                    r#"
                    INSERT INTO domino_players (game_id, user_id, joined_at, doc)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (game_id, user_id) DO UPDATE SET joined_at = $3, doc = $4
                    "#,
                )
                .bind(&game_id)
                .bind(&slot.user_id)
                .bind(slot.joined_at)
                .bind(serde_json::to_string(&slot)?)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::DeletePlayer { game_id, user_id } => {
                touched.push(game_id.clone());
                sqlx::query("DELETE FROM domino_players WHERE game_id = $1 AND user_id = $2")
                    .bind(&game_id)
                    .bind(&user_id)
                    .execute(&mut **tx)
                    .await?;
            }
            Mutation::AddActiveGame { user_id, game } => {
                let row = sqlx::query("SELECT doc FROM domino_users WHERE user_id = $1 FOR UPDATE")
                    .bind(&user_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                if let Some(row) = row {
                    let mut user: UserProfile =
                        serde_json::from_str(row.get::<String, _>("doc").as_str())?;
                    if !user.active_games.iter().any(|g| g.game_id == game.game_id) {
                        user.active_games.push(game);
                        sqlx::query("UPDATE domino_users SET doc = $2 WHERE user_id = $1")
                            .bind(&user_id)
                            .bind(serde_json::to_string(&user)?)
                            .execute(&mut **tx)
                            .await?;
                    }
                }
            }
            Mutation::RemoveActiveGame { user_id, game_id } => {
                let row = sqlx::query("SELECT doc FROM domino_users WHERE user_id = $1 FOR UPDATE")
                    .bind(&user_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                if let Some(row) = row {
                    let mut user: UserProfile =
                        serde_json::from_str(row.get::<String, _>("doc").as_str())?;
                    user.active_games.retain(|g| g.game_id != game_id);
                    sqlx::query("UPDATE domino_users SET doc = $2 WHERE user_id = $1")
                        .bind(&user_id)
                        .bind(serde_json::to_string(&user)?)
                        .execute(&mut **tx)
                        .await?;
                }
            }
            Mutation::PutPayout(payout) => {
                sqlx::query(
                    r#"
                    INSERT INTO domino_payouts (game_id, doc) VALUES ($1, $2)
                    ON CONFLICT (game_id) DO UPDATE SET doc = $2
                    "#,
                )
                .bind(&payout.game_id)
                .bind(serde_json::to_string(&payout)?)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::PutTransaction(record) => {
                sqlx::query(
                    "INSERT INTO domino_transactions (id, at, doc) VALUES ($1, $2, $3)",
                )
                .bind(&record.id)
                .bind(record.at)
                .bind(serde_json::to_string(&record)?)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}

const fn status_key(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Waiting => "waiting",
        GameStatus::Full => "full",
        GameStatus::Playing => "playing",
        GameStatus::RoundOver => "round_over",
        GameStatus::Finished => "finished",
    }
}

#[async_trait]
impl GameStore for PgStore {
    async fn get_template(&self, template_id: &str) -> StoreResult<Option<TournamentTemplate>> {
        let row = sqlx::query("SELECT doc FROM domino_templates WHERE id = $1")
            .bind(template_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(
                row.get::<String, _>("doc").as_str(),
            )?)),
            None => Ok(None),
        }
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query("SELECT doc FROM domino_users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(
                row.get::<String, _>("doc").as_str(),
            )?)),
            None => Ok(None),
        }
    }

    async fn load_game(&self, game_id: &str) -> StoreResult<Option<GameSnapshot>> {
        let row = sqlx::query("SELECT version, doc FROM domino_games WHERE id = $1")
            .bind(game_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => Ok(Some(self.snapshot_of_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_waiting_games(&self, template_id: &str) -> StoreResult<Vec<GameSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT version, doc FROM domino_games
            WHERE template_id = $1 AND status = 'waiting'
            ORDER BY created_at
            "#,
        )
        .bind(template_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            snapshots.push(self.snapshot_of_row(row).await?);
        }
        Ok(snapshots)
    }

    async fn list_games_for_template(&self, template_id: &str) -> StoreResult<Vec<GameSnapshot>> {
        let rows = sqlx::query(
            "SELECT version, doc FROM domino_games WHERE template_id = $1 ORDER BY created_at",
        )
        .bind(template_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            snapshots.push(self.snapshot_of_row(row).await?);
        }
        Ok(snapshots)
    }

    async fn get_payout(&self, game_id: &str) -> StoreResult<Option<PayoutRecord>> {
        let row = sqlx::query("SELECT doc FROM domino_payouts WHERE game_id = $1")
            .bind(game_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(
                row.get::<String, _>("doc").as_str(),
            )?)),
            None => Ok(None),
        }
    }

    async fn commit(&self, guards: &[VersionGuard], mutations: Vec<Mutation>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for guard in guards {
            let row = sqlx::query("SELECT version FROM domino_games WHERE id = $1 FOR UPDATE")
                .bind(&guard.game_id)
                .fetch_optional(&mut *tx)
                .await?;
            let current = row.map(|row| row.get::<i64, _>("version") as u64);
            if current != Some(guard.version) {
                tx.rollback().await?;
                return Err(StoreError::Conflict(guard.game_id.clone()));
            }
        }

        let mut touched = Vec::new();
        for mutation in mutations {
            Self::apply(&mut tx, mutation, &mut touched).await?;
        }

        for game_id in touched {
            sqlx::query("UPDATE domino_games SET version = version + 1 WHERE id = $1")
                .bind(&game_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
