//! Ready toggling, tile play, and passing.
//!
//! The turn transition itself is a pure function over a snapshot
//! ([`plan_turn`]); the engine methods wrap it in the rehydrate/commit/retry
//! loop and fire the post-commit timer work. Scheduler callbacks reuse the
//! same plan with the auto-action tags.

use chrono::{Duration, Utc};
use log::info;
use serde::Serialize;

use super::{DominoEngine, MAX_TXN_ATTEMPTS};
use crate::config::DominoConfig;
use crate::errors::{EngineError, EngineResult};
use crate::game::board::{BoardError, apply_move, has_valid_move};
use crate::game::dealing::{next_seat, start_round};
use crate::game::entities::{
    GameInstance, GameStatus, LastMove, Move, MoveAction, PlayerSlot, Tile, UserId,
};
use crate::game::scoring::{
    RoundResolution, RoundWinner, resolve_domino_out, resolve_tranque,
};
use crate::store::{GameSnapshot, Mutation};

/// What an action did, for the HTTP layer.
#[derive(Clone, Debug, Serialize)]
pub struct ActionReceipt {
    pub game_id: String,
    pub round_over: bool,
    pub game_over: bool,
    pub tranque: bool,
    pub points: u32,
    pub next_player: Option<UserId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReadyReceipt {
    pub game_id: String,
    pub is_ready: bool,
    pub round_started: bool,
}

/// A player-or-timer turn submission.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TurnRequest {
    Play(Move),
    Pass,
}

/// Pure result of applying a turn to a snapshot.
pub(crate) enum TurnOutcome {
    Continue {
        game: GameInstance,
        slot: PlayerSlot,
        next_player: UserId,
        next_secs: u64,
    },
    RoundOver {
        game: GameInstance,
        players: Vec<PlayerSlot>,
        resolution: RoundResolution,
        tranque: bool,
    },
    Finished {
        game: GameInstance,
        players: Vec<PlayerSlot>,
        resolution: RoundResolution,
        tranque: bool,
    },
}

/// Everything a round start writes, plus what the timer needs.
pub(crate) struct RoundStartPlan {
    pub game: GameInstance,
    pub players: Vec<PlayerSlot>,
    pub opener: UserId,
    pub first_turn_secs: u64,
}

/// Deal a round onto a full table's snapshot state.
pub(crate) fn plan_round_start(
    game: &GameInstance,
    players: &[PlayerSlot],
    config: &DominoConfig,
) -> EngineResult<RoundStartPlan> {
    let round = {
        let mut rng = rand::rng();
        start_round(game, players, config, &mut rng)
            .map_err(|err| EngineError::InvalidArgument(err.to_string()))?
    };

    let mut game = game.clone();
    game.status = GameStatus::Playing;
    game.round_number = round.round_number;
    game.board.clear();
    game.boneyard = round.boneyard;
    game.turn_order = round.turn_order;
    game.current_turn = Some(round.opener.clone());
    game.turn_timeout_seconds = Some(round.first_turn_secs);
    game.turn_deadline = Some(Utc::now() + Duration::seconds(round.first_turn_secs as i64));
    game.pass_count = 0;
    game.last_move = None;
    game.winner = None;
    game.winning_team = None;
    game.scheduled_start_id = None;
    game.scheduled_timer_id = None;

    let players = players
        .iter()
        .map(|p| {
            let mut slot = p.clone();
            slot.hand = round.hands[&p.user_id].clone();
            slot.is_ready = false;
            slot
        })
        .collect();

    Ok(RoundStartPlan {
        game,
        players,
        opener: round.opener,
        first_turn_secs: round.first_turn_secs,
    })
}

fn players_with(players: &[PlayerSlot], updated: &PlayerSlot) -> Vec<PlayerSlot> {
    players
        .iter()
        .map(|p| {
            if p.user_id == updated.user_id {
                updated.clone()
            } else {
                p.clone()
            }
        })
        .collect()
}

/// Close the round onto the game document: scores, winner fields, cleared
/// turn state, and the status split between `round_over` and `finished`.
fn end_round(
    mut game: GameInstance,
    mut players: Vec<PlayerSlot>,
    resolution: RoundResolution,
    tranque: bool,
) -> TurnOutcome {
    game.scores = resolution.new_scores.clone();
    game.winner = resolution.winner_id.clone();
    game.winning_team = match &resolution.winner {
        Some(RoundWinner::Team(team)) => Some(*team),
        _ => None,
    };
    game.pass_count = 0;
    game.clear_turn();

    for slot in &mut players {
        slot.score = game.score_for(&slot.score_key());
    }

    if resolution.target_reached {
        game.status = GameStatus::Finished;
        game.finished_at = Some(Utc::now());
        TurnOutcome::Finished {
            game,
            players,
            resolution,
            tranque,
        }
    } else {
        game.status = GameStatus::RoundOver;
        TurnOutcome::RoundOver {
            game,
            players,
            resolution,
            tranque,
        }
    }
}

/// Apply one turn to a snapshot without touching any port.
pub(crate) fn plan_turn(
    snapshot: &GameSnapshot,
    user_id: &str,
    request: &TurnRequest,
    action: MoveAction,
    config: &DominoConfig,
) -> EngineResult<TurnOutcome> {
    if snapshot.game.status != GameStatus::Playing {
        return Err(EngineError::GameNotInProgress);
    }
    let Some(slot) = snapshot.player(user_id) else {
        return Err(EngineError::PlayerNotSeated {
            game_id: snapshot.game.id.clone(),
            user_id: user_id.to_string(),
        });
    };
    if snapshot.game.current_turn.as_deref() != Some(user_id) {
        return Err(EngineError::OutOfTurn);
    }

    let mut game = snapshot.game.clone();
    let mut slot = slot.clone();

    match request {
        TurnRequest::Play(mv) => {
            if game.is_first_round()
                && game.board.is_empty()
                && !mv.tile.same_as(&Tile::double_six())
            {
                return Err(EngineError::MustOpenWithDoubleSix);
            }
            apply_move(&mut game.board, &mut slot.hand, mv).map_err(|err| match err {
                BoardError::TileNotInHand => EngineError::TileNotInHand,
                BoardError::IllegalPlacement => EngineError::IllegalMove,
            })?;
            game.pass_count = 0;
            game.last_move = Some(LastMove {
                user_id: user_id.to_string(),
                action,
                tile: Some(mv.tile),
                position: Some(mv.position),
                at: Utc::now(),
            });

            let players = players_with(&snapshot.players, &slot);
            if slot.hand.is_empty() {
                let resolution = resolve_domino_out(&game, &players, user_id);
                return Ok(end_round(game, players, resolution, false));
            }
        }
        TurnRequest::Pass => {
            if has_valid_move(&slot.hand, &game.board) {
                return Err(EngineError::HasValidMoves);
            }
            game.pass_count += 1;
            game.last_move = Some(LastMove {
                user_id: user_id.to_string(),
                action,
                tile: None,
                position: None,
                at: Utc::now(),
            });

            // The passer is blocked; if every other hand is too, the round
            // is a tranque.
            let all_blocked = snapshot
                .players
                .iter()
                .filter(|p| p.user_id != user_id)
                .all(|p| !has_valid_move(&p.hand, &game.board));
            if all_blocked {
                let players = snapshot.players.clone();
                let resolution = resolve_tranque(&game, &players);
                return Ok(end_round(game, players, resolution, true));
            }
        }
    }

    let next_player =
        next_seat(&game.turn_order, user_id).ok_or(EngineError::TurnOrderUnavailable)?;
    let next_hand = snapshot
        .player(&next_player)
        .map(|p| p.hand.as_slice())
        .unwrap_or_default();
    let next_secs = if has_valid_move(next_hand, &game.board) {
        config.turn_timeout_secs
    } else {
        config.pass_timeout_secs
    };
    game.current_turn = Some(next_player.clone());
    game.turn_timeout_seconds = Some(next_secs);
    game.turn_deadline = Some(Utc::now() + Duration::seconds(next_secs as i64));
    game.scheduled_timer_id = None;

    Ok(TurnOutcome::Continue {
        game,
        slot,
        next_player,
        next_secs,
    })
}

impl DominoEngine {
    /// Toggle a ready flag on a full table. A unanimous ready starts the
    /// round in the same transaction and cancels the countdown.
    ///
    /// # Errors
    ///
    /// `NotInReadyPhase` unless the table is full and idle.
    pub async fn toggle_ready(&self, game_id: &str, user_id: &str) -> EngineResult<ReadyReceipt> {
        for _ in 0..MAX_TXN_ATTEMPTS {
            let snapshot = self.require_game(game_id).await?;
            if snapshot.game.status != GameStatus::Full {
                return Err(EngineError::NotInReadyPhase);
            }
            let Some(slot) = snapshot.player(user_id) else {
                return Err(EngineError::PlayerNotSeated {
                    game_id: game_id.to_string(),
                    user_id: user_id.to_string(),
                });
            };

            let mut slot = slot.clone();
            slot.is_ready = !slot.is_ready;
            let everyone_ready = slot.is_ready
                && snapshot
                    .players
                    .iter()
                    .filter(|p| p.user_id != user_id)
                    .all(|p| p.is_ready);

            if everyone_ready {
                let players = players_with(&snapshot.players, &slot);
                let start_task = snapshot.game.scheduled_start_id.clone();
                let plan = plan_round_start(&snapshot.game, &players, &self.config)?;

                let mut mutations = vec![Mutation::PutGame(plan.game)];
                for player in &plan.players {
                    mutations.push(Mutation::PutPlayer {
                        game_id: game_id.to_string(),
                        slot: player.clone(),
                    });
                }
                if self.try_commit(&[snapshot.guard()], mutations).await? {
                    info!(
                        "game {game_id} started early on unanimous ready; {} opens",
                        plan.opener
                    );
                    self.cancel_task(start_task.as_deref()).await;
                    self.arm_turn_timer(game_id, &plan.opener, plan.first_turn_secs)
                        .await?;
                    return Ok(ReadyReceipt {
                        game_id: game_id.to_string(),
                        is_ready: true,
                        round_started: true,
                    });
                }
            } else {
                let is_ready = slot.is_ready;
                let mutations = vec![Mutation::PutPlayer {
                    game_id: game_id.to_string(),
                    slot,
                }];
                if self.try_commit(&[snapshot.guard()], mutations).await? {
                    return Ok(ReadyReceipt {
                        game_id: game_id.to_string(),
                        is_ready,
                        round_started: false,
                    });
                }
            }
        }
        Err(Self::conflict(game_id))
    }

    /// Play a tile on the board.
    ///
    /// # Errors
    ///
    /// `OutOfTurn`, `TileNotInHand`, `IllegalMove`, or
    /// `MustOpenWithDoubleSix` on the first round's opening move.
    pub async fn play_tile(
        &self,
        game_id: &str,
        user_id: &str,
        mv: Move,
    ) -> EngineResult<ActionReceipt> {
        self.take_turn(game_id, user_id, TurnRequest::Play(mv), MoveAction::Play)
            .await
    }

    /// Pass the turn. Only legal with no playable tile.
    pub async fn pass_turn(&self, game_id: &str, user_id: &str) -> EngineResult<ActionReceipt> {
        self.take_turn(game_id, user_id, TurnRequest::Pass, MoveAction::Pass)
            .await
    }

    pub(crate) async fn take_turn(
        &self,
        game_id: &str,
        user_id: &str,
        request: TurnRequest,
        action: MoveAction,
    ) -> EngineResult<ActionReceipt> {
        for _ in 0..MAX_TXN_ATTEMPTS {
            let snapshot = self.require_game(game_id).await?;
            let old_timer = snapshot.game.scheduled_timer_id.clone();

            match plan_turn(&snapshot, user_id, &request, action, &self.config)? {
                TurnOutcome::Continue {
                    game,
                    slot,
                    next_player,
                    next_secs,
                } => {
                    let mutations = vec![
                        Mutation::PutGame(game),
                        Mutation::PutPlayer {
                            game_id: game_id.to_string(),
                            slot,
                        },
                    ];
                    if self.try_commit(&[snapshot.guard()], mutations).await? {
                        self.cancel_task(old_timer.as_deref()).await;
                        self.arm_turn_timer(game_id, &next_player, next_secs).await?;
                        return Ok(ActionReceipt {
                            game_id: game_id.to_string(),
                            round_over: false,
                            game_over: false,
                            tranque: false,
                            points: 0,
                            next_player: Some(next_player),
                        });
                    }
                }
                TurnOutcome::RoundOver {
                    game,
                    players,
                    resolution,
                    tranque,
                } => {
                    let round = game.round_number;
                    let mut mutations = vec![Mutation::PutGame(game)];
                    for player in &players {
                        mutations.push(Mutation::PutPlayer {
                            game_id: game_id.to_string(),
                            slot: player.clone(),
                        });
                    }
                    if self.try_commit(&[snapshot.guard()], mutations).await? {
                        info!(
                            "game {game_id} round {round} over ({} points, tranque: {tranque})",
                            resolution.points
                        );
                        self.cancel_task(old_timer.as_deref()).await;
                        self.arm_start_task(
                            game_id,
                            self.config.next_round_delay_secs,
                            GameStatus::RoundOver,
                        )
                        .await?;
                        return Ok(ActionReceipt {
                            game_id: game_id.to_string(),
                            round_over: true,
                            game_over: false,
                            tranque,
                            points: resolution.points,
                            next_player: None,
                        });
                    }
                }
                TurnOutcome::Finished {
                    mut game,
                    mut players,
                    resolution,
                    tranque,
                } => {
                    let settlement = self.plan_settlement(&game, &players);
                    game.winner = settlement.payout.winners.first().cloned();
                    game.winning_team = settlement.payout.winning_team;
                    // Scores live per tournament; the payout record keeps
                    // the finals.
                    for value in game.scores.values_mut() {
                        *value = 0;
                    }
                    for player in &mut players {
                        player.score = 0;
                    }

                    let mut mutations = vec![Mutation::PutGame(game)];
                    for player in &players {
                        mutations.push(Mutation::PutPlayer {
                            game_id: game_id.to_string(),
                            slot: player.clone(),
                        });
                    }
                    mutations.push(Mutation::PutPayout(settlement.payout.clone()));
                    mutations.extend(settlement.user_mutations.clone());

                    if self.try_commit(&[snapshot.guard()], mutations).await? {
                        info!(
                            "game {game_id} finished; {} winner(s) split {} VES net",
                            settlement.payout.winners.len(),
                            settlement.payout.net_prize_ves
                        );
                        self.cancel_task(old_timer.as_deref()).await;
                        self.credit_winners(&settlement).await;
                        return Ok(ActionReceipt {
                            game_id: game_id.to_string(),
                            round_over: true,
                            game_over: true,
                            tranque,
                            points: resolution.points,
                            next_player: None,
                        });
                    }
                }
            }
        }
        Err(Self::conflict(game_id))
    }
}
