//! # Domino Engine
//!
//! A transactional double-six domino tournament engine.
//!
//! The engine runs cash tournaments: players buy seats with an entry fee,
//! four-seat tables deal the full 28-tile set, rounds accumulate points from
//! losing hands, and the first player (or partnership team) to the target
//! score takes the prize pool minus the house commission.
//!
//! ## Architecture
//!
//! The engine itself holds no state between invocations. Every operation is
//! a transaction against a document store:
//!
//! - **Rehydrate**: load the game snapshot (document + player slots) with an
//!   optimistic version.
//! - **Compute**: apply the pure game logic in [`game`] to produce the next
//!   state and a batch of typed mutations.
//! - **Commit**: write the batch under the snapshot's version guard; a
//!   conflict means a concurrent writer won and the operation retries.
//! - **Effects**: arm or cancel scheduler tasks and move ledger money
//!   strictly after the commit, with compensating actions on failure.
//!
//! Timers are external: a full table's start countdown and every turn's
//! timeout are delayed tasks that call back into the engine, which
//! re-validates the stored state before acting so stale fires are harmless.
//!
//! ## Core Modules
//!
//! - [`game`]: tiles, board legality, dealing, and scoring — pure logic
//! - [`engine`]: the transactional orchestration of every player operation
//! - [`store`], [`ledger`], [`scheduler`]: the three external-collaborator
//!   ports, each with in-memory and production implementations

pub mod config;
pub mod engine;
pub mod errors;
pub mod game;
pub mod ledger;
pub mod scheduler;
pub mod store;

pub use config::DominoConfig;
pub use engine::DominoEngine;
pub use errors::{EngineError, EngineResult, ErrorCode};
pub use game::entities::{
    GameInstance, GameStatus, Move, PlayerSlot, RulesetType, Team, Tile, TilePosition,
    TournamentTemplate, UserProfile,
};
