//! Tournament settlement.
//!
//! Settlement writes one payout record per tournament and clears every
//! seated player's active-game reference in the same transaction as the
//! final game state. Winner credits go through the ledger strictly after
//! the commit; the payout record is the source of truth if a credit fails.

use chrono::Utc;
use log::{error, info, warn};

use super::DominoEngine;
use crate::game::entities::{GameInstance, PayoutRecord, PlayerSlot, UserId};
use crate::game::scoring::{split_prize, tournament_winners};
use crate::store::Mutation;

pub(crate) struct Settlement {
    pub payout: PayoutRecord,
    pub user_mutations: Vec<Mutation>,
    pub credits: Vec<(UserId, i64)>,
}

impl DominoEngine {
    /// Assemble the payout record, user-profile cleanups, and ledger credits
    /// for a tournament that just reached its target score.
    pub(crate) fn plan_settlement(
        &self,
        game: &GameInstance,
        players: &[PlayerSlot],
    ) -> Settlement {
        let (winners, winning_team) = tournament_winners(game, players, &game.scores);
        if winners.is_empty() {
            warn!("game {} finished with no qualifying winner", game.id);
        }
        let split = split_prize(
            game.prize_pool_ves,
            self.config.commission_percent,
            winners.len(),
        );

        let payout = PayoutRecord {
            game_id: game.id.clone(),
            ruleset: game.ruleset,
            winners: winners.clone(),
            winning_team,
            total_prize_ves: split.total,
            commission_ves: split.commission,
            net_prize_ves: split.net,
            prize_per_winner_ves: split.per_winner,
            final_scores: game.scores.clone(),
            at: Utc::now(),
        };

        let user_mutations = players
            .iter()
            .map(|player| Mutation::RemoveActiveGame {
                user_id: player.user_id.clone(),
                game_id: game.id.clone(),
            })
            .collect();

        let credits = winners
            .into_iter()
            .map(|winner| (winner, split.per_winner))
            .collect();

        Settlement {
            payout,
            user_mutations,
            credits,
        }
    }

    /// Pay the winners. Post-commit and best-effort per credit.
    pub(crate) async fn credit_winners(&self, settlement: &Settlement) {
        for (user_id, amount) in &settlement.credits {
            if *amount <= 0 {
                continue;
            }
            match self.ledger.increment(user_id, *amount).await {
                Ok(balance) => {
                    info!("credited {amount} VES to {user_id} (balance now {balance})");
                }
                Err(err) => {
                    error!("prize credit of {amount} VES to {user_id} failed: {err}");
                }
            }
        }
    }
}
