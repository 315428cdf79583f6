//! In-memory store for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::Mutex;

use super::{GameSnapshot, GameStore, Mutation, StoreError, StoreResult, VersionGuard};
use crate::game::entities::{
    EntryTransaction, GameId, GameInstance, GameStatus, PayoutRecord, PlayerSlot, TemplateId,
    TournamentTemplate, UserId, UserProfile,
};

#[derive(Clone, Debug)]
struct GameDoc {
    game: GameInstance,
    players: HashMap<UserId, PlayerSlot>,
    version: u64,
}

#[derive(Default)]
struct Inner {
    templates: HashMap<TemplateId, TournamentTemplate>,
    users: HashMap<UserId, UserProfile>,
    games: HashMap<GameId, GameDoc>,
    payouts: HashMap<GameId, PayoutRecord>,
    transactions: Vec<EntryTransaction>,
}

/// Versioned in-memory document store. Commits bump the version of every
/// game they touch, so a concurrent commit against a stale snapshot fails
/// with [`StoreError::Conflict`] exactly as the real backend would.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_template(&self, template: TournamentTemplate) {
        self.inner
            .lock()
            .await
            .templates
            .insert(template.id.clone(), template);
    }

    pub async fn seed_user(&self, user: UserProfile) {
        self.inner.lock().await.users.insert(user.user_id.clone(), user);
    }

    /// All recorded entry transactions, in commit order.
    pub async fn transactions(&self) -> Vec<EntryTransaction> {
        self.inner.lock().await.transactions.clone()
    }

    fn snapshot_of(doc: &GameDoc) -> GameSnapshot {
        let mut players: Vec<PlayerSlot> = doc.players.values().cloned().collect();
        players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        GameSnapshot {
            game: doc.game.clone(),
            players,
            version: doc.version,
        }
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn get_template(&self, template_id: &str) -> StoreResult<Option<TournamentTemplate>> {
        Ok(self.inner.lock().await.templates.get(template_id).cloned())
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.inner.lock().await.users.get(user_id).cloned())
    }

    async fn load_game(&self, game_id: &str) -> StoreResult<Option<GameSnapshot>> {
        Ok(self
            .inner
            .lock()
            .await
            .games
            .get(game_id)
            .map(Self::snapshot_of))
    }

    async fn find_waiting_games(&self, template_id: &str) -> StoreResult<Vec<GameSnapshot>> {
        let inner = self.inner.lock().await;
        let mut waiting: Vec<GameSnapshot> = inner
            .games
            .values()
            .filter(|doc| {
                doc.game.template_id == template_id && doc.game.status == GameStatus::Waiting
            })
            .map(Self::snapshot_of)
            .collect();
        waiting.sort_by(|a, b| a.game.created_at.cmp(&b.game.created_at));
        Ok(waiting)
    }

    async fn list_games_for_template(&self, template_id: &str) -> StoreResult<Vec<GameSnapshot>> {
        let inner = self.inner.lock().await;
        let mut games: Vec<GameSnapshot> = inner
            .games
            .values()
            .filter(|doc| doc.game.template_id == template_id)
            .map(Self::snapshot_of)
            .collect();
        games.sort_by(|a, b| a.game.created_at.cmp(&b.game.created_at));
        Ok(games)
    }

    async fn get_payout(&self, game_id: &str) -> StoreResult<Option<PayoutRecord>> {
        Ok(self.inner.lock().await.payouts.get(game_id).cloned())
    }

    async fn commit(&self, guards: &[VersionGuard], mutations: Vec<Mutation>) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;

        for guard in guards {
            let current = inner.games.get(&guard.game_id).map(|doc| doc.version);
            if current != Some(guard.version) {
                return Err(StoreError::Conflict(guard.game_id.clone()));
            }
        }

        let mut touched: Vec<GameId> = Vec::new();
        for mutation in mutations {
            match mutation {
                Mutation::PutTemplate(template) => {
                    inner.templates.insert(template.id.clone(), template);
                }
                Mutation::DeleteTemplate(template_id) => {
                    inner.templates.remove(&template_id);
                }
                Mutation::PutGame(game) => {
                    touched.push(game.id.clone());
                    match inner.games.entry(game.id.clone()) {
                        Entry::Occupied(mut entry) => entry.get_mut().game = game,
                        Entry::Vacant(entry) => {
                            entry.insert(GameDoc {
                                game,
                                players: HashMap::new(),
                                version: 0,
                            });
                        }
                    }
                }
                Mutation::DeleteGame(game_id) => {
                    inner.games.remove(&game_id);
                }
                Mutation::PutPlayer { game_id, slot } => {
                    touched.push(game_id.clone());
                    if let Some(doc) = inner.games.get_mut(&game_id) {
                        doc.players.insert(slot.user_id.clone(), slot);
                    }
                }
                Mutation::DeletePlayer { game_id, user_id } => {
                    touched.push(game_id.clone());
                    if let Some(doc) = inner.games.get_mut(&game_id) {
                        doc.players.remove(&user_id);
                    }
                }
                Mutation::AddActiveGame { user_id, game } => {
                    if let Some(user) = inner.users.get_mut(&user_id) {
                        if !user.active_games.iter().any(|g| g.game_id == game.game_id) {
                            user.active_games.push(game);
                        }
                    }
                }
                Mutation::RemoveActiveGame { user_id, game_id } => {
                    if let Some(user) = inner.users.get_mut(&user_id) {
                        user.active_games.retain(|g| g.game_id != game_id);
                    }
                }
                Mutation::PutPayout(payout) => {
                    inner.payouts.insert(payout.game_id.clone(), payout);
                }
                Mutation::PutTransaction(tx) => {
                    inner.transactions.push(tx);
                }
            }
        }

        for game_id in touched {
            if let Some(doc) = inner.games.get_mut(&game_id) {
                doc.version += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{RulesetType, TemplateStatus};
    use chrono::Utc;

    fn template() -> TournamentTemplate {
        TournamentTemplate {
            id: "t1".into(),
            name: "mesa".into(),
            ruleset: RulesetType::Individual,
            entry_fee_usd_cents: 100,
            entry_fee_ves: 100,
            status: TemplateStatus::Open,
            max_players: 4,
            target_score: 100,
            created_by: "admin".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn commit_bumps_version_and_stale_guards_conflict() {
        let store = MemoryStore::new();
        let game = GameInstance::open_table(&template());
        let game_id = game.id.clone();

        store.commit(&[], vec![Mutation::PutGame(game)]).await.unwrap();
        let snap = store.load_game(&game_id).await.unwrap().unwrap();
        assert_eq!(snap.version, 1);

        let mut updated = snap.game.clone();
        updated.player_count = 1;
        store
            .commit(&[snap.guard()], vec![Mutation::PutGame(updated.clone())])
            .await
            .unwrap();

        // The first snapshot is now stale.
        let err = store
            .commit(&[snap.guard()], vec![Mutation::PutGame(updated)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(id) if id == game_id));
    }

    #[tokio::test]
    async fn delete_game_removes_players_with_it() {
        let store = MemoryStore::new();
        let game = GameInstance::open_table(&template());
        let game_id = game.id.clone();
        store
            .commit(
                &[],
                vec![
                    Mutation::PutGame(game),
                    Mutation::PutPlayer {
                        game_id: game_id.clone(),
                        slot: PlayerSlot::new("u1".into(), "ana".into(), None),
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            store.load_game(&game_id).await.unwrap().unwrap().players.len(),
            1
        );

        store
            .commit(&[], vec![Mutation::DeleteGame(game_id.clone())])
            .await
            .unwrap();
        assert!(store.load_game(&game_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_game_edits_are_targeted_not_overwrites() {
        use crate::game::entities::{ActiveGameRef, UserProfile, UserRole};

        let store = MemoryStore::new();
        store
            .seed_user(UserProfile {
                user_id: "u1".into(),
                username: "ana".into(),
                role: UserRole::Player,
                active_games: vec![ActiveGameRef {
                    game_id: "g2".into(),
                    template_id: "t1".into(),
                }],
            })
            .await;

        // Two commits built without re-reading the profile; neither loses
        // the other's edit.
        store
            .commit(
                &[],
                vec![Mutation::AddActiveGame {
                    user_id: "u1".into(),
                    game: ActiveGameRef {
                        game_id: "g1".into(),
                        template_id: "t1".into(),
                    },
                }],
            )
            .await
            .unwrap();
        store
            .commit(
                &[],
                vec![Mutation::RemoveActiveGame {
                    user_id: "u1".into(),
                    game_id: "g2".into(),
                }],
            )
            .await
            .unwrap();

        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.active_games.len(), 1);
        assert_eq!(user.active_games[0].game_id, "g1");

        // A duplicate add is ignored.
        store
            .commit(
                &[],
                vec![Mutation::AddActiveGame {
                    user_id: "u1".into(),
                    game: ActiveGameRef {
                        game_id: "g1".into(),
                        template_id: "t1".into(),
                    },
                }],
            )
            .await
            .unwrap();
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.active_games.len(), 1);
    }

    #[tokio::test]
    async fn waiting_games_filtered_by_template_and_status() {
        let store = MemoryStore::new();
        let waiting = GameInstance::open_table(&template());
        let mut playing = GameInstance::open_table(&template());
        playing.status = GameStatus::Playing;
        store
            .commit(
                &[],
                vec![Mutation::PutGame(waiting.clone()), Mutation::PutGame(playing)],
            )
            .await
            .unwrap();

        let found = store.find_waiting_games("t1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].game.id, waiting.id);
        assert!(store.find_waiting_games("other").await.unwrap().is_empty());
    }
}
