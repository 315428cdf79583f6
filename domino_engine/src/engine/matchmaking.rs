//! Entry purchase and refund.
//!
//! The ledger debit happens before the store commit and is compensated with
//! a credit if seating fails; refunds credit strictly after the commit so a
//! failed commit can never pay out.

use log::{error, info};
use serde::Serialize;

use super::{DominoEngine, MAX_TXN_ATTEMPTS};
use crate::errors::{EngineError, EngineResult};
use crate::game::dealing::initial_turn_order;
use crate::game::entities::{
    ActiveGameRef, EntryTransaction, EntryTxKind, GameInstance, GameStatus, PlayerSlot,
    RulesetType, Team, TemplateStatus, TournamentTemplate, UserProfile,
};
use crate::store::{GameSnapshot, Mutation};

/// What a successful entry purchase bought.
#[derive(Clone, Debug, Serialize)]
pub struct EntryReceipt {
    pub game_id: String,
    pub status: GameStatus,
    pub seats_taken: usize,
    pub entry_fee_ves: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RefundReceipt {
    pub game_id: String,
    pub amount_ves: i64,
}

impl DominoEngine {
    /// Buy a seat in a tournament.
    ///
    /// Seats the player at the oldest waiting table (opening a fresh one
    /// when none exists) and arms the start countdown once the table fills.
    ///
    /// # Errors
    ///
    /// `TemplateClosed`, `TeamRequired`, `AlreadyEnrolled`, `AlreadySeated`,
    /// or `InsufficientBalance`.
    pub async fn purchase_entry(
        &self,
        template_id: &str,
        user_id: &str,
        team: Option<Team>,
    ) -> EngineResult<EntryReceipt> {
        let user = self.require_user(user_id).await?;
        let template = self.require_template(template_id).await?;
        if template.status != TemplateStatus::Open {
            return Err(EngineError::TemplateClosed);
        }
        match template.ruleset {
            RulesetType::Partnership if team.is_none() => return Err(EngineError::TeamRequired),
            RulesetType::Individual if team.is_some() => {
                return Err(EngineError::InvalidArgument(
                    "individual tournaments have no teams".into(),
                ));
            }
            _ => {}
        }
        if user.is_enrolled_in(template_id) {
            return Err(EngineError::AlreadyEnrolled);
        }

        let fee = template.entry_fee_ves;
        self.ledger.decrement(user_id, fee).await?;

        let receipt = match self.seat_player(&template, &user, team).await {
            Ok(receipt) => receipt,
            Err(err) => {
                // The seat was never taken; give the fee back.
                if let Err(credit_err) = self.ledger.increment(user_id, fee).await {
                    error!(
                        "compensating credit of {fee} VES to {user_id} failed after \
                         aborted entry: {credit_err}"
                    );
                }
                return Err(err);
            }
        };

        // The seat is committed; a scheduler failure here surfaces to the
        // caller but must not unwind the paid entry.
        if receipt.status == GameStatus::Full {
            self.arm_start_task(
                &receipt.game_id,
                self.config.start_game_delay_secs,
                GameStatus::Full,
            )
            .await?;
        }
        Ok(receipt)
    }

    async fn seat_player(
        &self,
        template: &TournamentTemplate,
        user: &UserProfile,
        team: Option<Team>,
    ) -> EngineResult<EntryReceipt> {
        for _ in 0..MAX_TXN_ATTEMPTS {
            let (mut game, players, guards) = match self.find_seat(template, &user.user_id, team).await? {
                Some(snapshot) => {
                    let guard = snapshot.guard();
                    (snapshot.game, snapshot.players, vec![guard])
                }
                None => (GameInstance::open_table(template), Vec::new(), Vec::new()),
            };

            let slot = PlayerSlot::new(user.user_id.clone(), user.username.clone(), team);
            game.player_count = players.len() + 1;
            game.prize_pool_ves += template.entry_fee_ves;
            if game.player_count == game.max_players {
                game.status = GameStatus::Full;
                let mut seated = players;
                seated.push(slot.clone());
                game.turn_order = initial_turn_order(&seated, game.ruleset);
            }

            let receipt = EntryReceipt {
                game_id: game.id.clone(),
                status: game.status,
                seats_taken: game.player_count,
                entry_fee_ves: template.entry_fee_ves,
            };
            let game_id = game.id.clone();
            let record =
                EntryTransaction::record(EntryTxKind::Buy, template.entry_fee_ves, &user.user_id, &game);

            let mutations = vec![
                Mutation::PutGame(game),
                Mutation::PutPlayer {
                    game_id: game_id.clone(),
                    slot,
                },
                Mutation::AddActiveGame {
                    user_id: user.user_id.clone(),
                    game: ActiveGameRef {
                        game_id: game_id.clone(),
                        template_id: template.id.clone(),
                    },
                },
                Mutation::PutTransaction(record),
            ];
            if self.try_commit(&guards, mutations).await? {
                info!(
                    "{} bought into template {} at game {game_id} ({}/{} seats)",
                    user.user_id, template.id, receipt.seats_taken, template.max_players
                );
                return Ok(receipt);
            }
        }
        Err(Self::conflict(&template.id))
    }

    /// The oldest waiting table for `template` that can seat the player on
    /// the requested side, if any. No table fitting means the caller opens a
    /// fresh one.
    async fn find_seat(
        &self,
        template: &TournamentTemplate,
        user_id: &str,
        team: Option<Team>,
    ) -> EngineResult<Option<GameSnapshot>> {
        let waiting = self.store.find_waiting_games(&template.id).await?;
        for snapshot in waiting {
            if snapshot.players.len() >= snapshot.game.max_players {
                continue;
            }
            if snapshot.player(user_id).is_some() {
                return Err(EngineError::AlreadySeated);
            }
            if let Some(team) = team {
                let taken = snapshot
                    .players
                    .iter()
                    .filter(|p| p.team == Some(team))
                    .count();
                if taken >= self.config.team_capacity() {
                    continue;
                }
            }
            return Ok(Some(snapshot));
        }
        Ok(None)
    }

    /// Refund an entry before the first deal.
    ///
    /// Allowed while the table is `waiting` or `full`; a full table reverts
    /// to `waiting`, its countdown is cancelled, and its not-yet-activated
    /// turn order is cleared. The last refund leaves an empty waiting table
    /// for the next entrant; only template deletion destroys tables.
    ///
    /// # Errors
    ///
    /// `RefundWindowClosed` once the first round has been dealt.
    pub async fn refund_entry(&self, game_id: &str, user_id: &str) -> EngineResult<RefundReceipt> {
        for _ in 0..MAX_TXN_ATTEMPTS {
            let snapshot = self.require_game(game_id).await?;
            if snapshot.player(user_id).is_none() {
                return Err(EngineError::PlayerNotSeated {
                    game_id: game_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }
            if !matches!(
                snapshot.game.status,
                GameStatus::Waiting | GameStatus::Full
            ) {
                return Err(EngineError::RefundWindowClosed);
            }

            let fee = snapshot.game.entry_fee_ves;
            let start_task = snapshot.game.scheduled_start_id.clone();

            let mut game = snapshot.game.clone();
            game.player_count = snapshot.players.len() - 1;
            game.prize_pool_ves -= fee;
            game.status = GameStatus::Waiting;
            game.turn_order.clear();
            game.scheduled_start_id = None;

            let record = EntryTransaction::record(EntryTxKind::Refund, fee, user_id, &snapshot.game);
            let mutations = vec![
                Mutation::PutGame(game),
                Mutation::DeletePlayer {
                    game_id: game_id.to_string(),
                    user_id: user_id.to_string(),
                },
                Mutation::RemoveActiveGame {
                    user_id: user_id.to_string(),
                    game_id: game_id.to_string(),
                },
                Mutation::PutTransaction(record),
            ];

            if self.try_commit(&[snapshot.guard()], mutations).await? {
                self.cancel_task(start_task.as_deref()).await;
                if let Err(err) = self.ledger.increment(user_id, fee).await {
                    error!("refund credit of {fee} VES to {user_id} failed: {err}");
                }
                info!("{user_id} refunded {fee} VES out of game {game_id}");
                return Ok(RefundReceipt {
                    game_id: game_id.to_string(),
                    amount_ves: fee,
                });
            }
        }
        Err(Self::conflict(game_id))
    }
}
