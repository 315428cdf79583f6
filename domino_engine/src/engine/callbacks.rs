//! Scheduler-fired callbacks.
//!
//! Cancellation is best-effort, so any task can fire against a game that
//! already moved on. Callbacks therefore re-validate everything against the
//! stored state and treat mismatches as benign no-ops; only transport-level
//! failures surface as errors.

use log::{info, warn};

use super::DominoEngine;
use super::play::{TurnRequest, plan_round_start};
use crate::errors::{EngineError, EngineResult};
use crate::game::board::{forced_opening_move, valid_moves};
use crate::game::entities::{GameStatus, Move, MoveAction, Tile};
use crate::store::Mutation;

impl DominoEngine {
    /// Start-delay and next-round trigger.
    ///
    /// Deals a round for a `full` or `round_over` table. A table that lost
    /// seats to refunds while the countdown ran is reverted to `waiting`.
    /// Any other state means the task is stale and nothing happens.
    pub async fn start_game_callback(&self, game_id: &str) -> EngineResult<()> {
        for _ in 0..super::MAX_TXN_ATTEMPTS {
            let Some(snapshot) = self.store.load_game(game_id).await? else {
                info!("start task fired for missing game {game_id}; ignoring");
                return Ok(());
            };
            match snapshot.game.status {
                GameStatus::Full | GameStatus::RoundOver => {}
                status => {
                    info!("start task fired for game {game_id} in {status:?}; ignoring");
                    return Ok(());
                }
            }

            if snapshot.players.len() != snapshot.game.max_players {
                warn!(
                    "game {game_id} fired its start task with {} of {} seats; reverting to waiting",
                    snapshot.players.len(),
                    snapshot.game.max_players
                );
                let mut game = snapshot.game.clone();
                game.status = GameStatus::Waiting;
                game.turn_order.clear();
                game.scheduled_start_id = None;
                if self
                    .try_commit(&[snapshot.guard()], vec![Mutation::PutGame(game)])
                    .await?
                {
                    return Ok(());
                }
                continue;
            }

            let plan = plan_round_start(&snapshot.game, &snapshot.players, &self.config)?;
            let round = plan.game.round_number;
            let mut mutations = vec![Mutation::PutGame(plan.game)];
            for slot in &plan.players {
                mutations.push(Mutation::PutPlayer {
                    game_id: game_id.to_string(),
                    slot: slot.clone(),
                });
            }
            if self.try_commit(&[snapshot.guard()], mutations).await? {
                info!("game {game_id} round {round} started by timer; {} opens", plan.opener);
                self.arm_turn_timer(game_id, &plan.opener, plan.first_turn_secs)
                    .await?;
                return Ok(());
            }
        }
        Err(Self::conflict(game_id))
    }

    /// Turn-timeout trigger: auto-play a tile for the stalled player, or
    /// auto-pass when they hold nothing playable.
    pub async fn turn_timeout_callback(
        &self,
        game_id: &str,
        expected_player_id: &str,
    ) -> EngineResult<()> {
        let Some(snapshot) = self.store.load_game(game_id).await? else {
            info!("turn timer fired for missing game {game_id}; ignoring");
            return Ok(());
        };
        if snapshot.game.status != GameStatus::Playing {
            info!(
                "turn timer fired for game {game_id} in {:?}; ignoring",
                snapshot.game.status
            );
            return Ok(());
        }
        if snapshot.game.current_turn.as_deref() != Some(expected_player_id) {
            info!(
                "turn timer for {expected_player_id} on game {game_id} is stale \
                 (turn is {:?}); ignoring",
                snapshot.game.current_turn
            );
            return Ok(());
        }
        let Some(slot) = snapshot.player(expected_player_id) else {
            warn!("turn timer expects {expected_player_id} who is not seated at {game_id}");
            return Ok(());
        };

        let request = pick_auto_action(
            snapshot.game.is_first_round() && snapshot.game.board.is_empty(),
            &slot.hand,
            &snapshot.game.board,
        );
        let action = match request {
            TurnRequest::Play(_) => MoveAction::AutoPlay,
            TurnRequest::Pass => MoveAction::AutoPass,
        };

        match self
            .take_turn(game_id, expected_player_id, request, action)
            .await
        {
            Ok(receipt) => {
                info!(
                    "auto {} for {expected_player_id} on game {game_id}",
                    if receipt.round_over { "action ended the round" } else { "action applied" }
                );
                Ok(())
            }
            Err(err @ (EngineError::Store(_) | EngineError::Scheduler(_) | EngineError::Ledger(_))) => {
                Err(err)
            }
            Err(err) => {
                // The player acted (or the game moved on) while we decided.
                info!("turn timeout for {expected_player_id} on {game_id} no longer applies: {err}");
                Ok(())
            }
        }
    }
}

/// Choose the timed-out player's move: the forced double six on the first
/// round's opening, otherwise a random legal tile, otherwise a pass.
fn pick_auto_action(forced_opening: bool, hand: &[Tile], board: &[Tile]) -> TurnRequest {
    if forced_opening {
        if let Some(mv) = forced_opening_move(hand) {
            return TurnRequest::Play(mv);
        }
    }
    let moves: Vec<Move> = valid_moves(hand, board);
    if moves.is_empty() {
        TurnRequest::Pass
    } else {
        let index = {
            let mut rng = rand::rng();
            rand::Rng::random_range(&mut rng, 0..moves.len())
        };
        TurnRequest::Play(moves[index])
    }
}
