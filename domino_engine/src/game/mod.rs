//! Pure domino game logic: entities, move legality, dealing, and scoring.
//!
//! Nothing in this module performs I/O; the engine rehydrates state from the
//! store, calls in here, and persists the results.

pub mod board;
pub mod dealing;
pub mod entities;
pub mod scoring;

pub use board::{apply_move, forced_opening_move, has_valid_move, open_ends, valid_moves};
pub use dealing::{RoundStart, initial_turn_order, next_seat, start_round};
pub use entities::{
    GameId, GameInstance, GameStatus, Move, PlayerSlot, RulesetType, Team, TemplateId, Tile,
    TilePosition, TournamentTemplate, UserId,
};
pub use scoring::{RoundResolution, RoundWinner, resolve_domino_out, resolve_tranque, split_prize};
