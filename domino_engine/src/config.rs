//! Engine configuration.
//!
//! Every timing constant, score target, and fee rule lives here and is
//! passed explicitly into the components that need it. Nothing in the
//! engine reads configuration from ambient globals.

use serde::{Deserialize, Serialize};

/// Tiles dealt to each seat at round start.
pub const DEFAULT_HAND_SIZE: usize = 7;
/// Seats at a table.
pub const DEFAULT_MAX_PLAYERS: usize = 4;
/// Cumulative score that ends the tournament.
pub const DEFAULT_TARGET_SCORE: u32 = 100;
/// House cut taken from the prize pool at settlement.
pub const DEFAULT_COMMISSION_PERCENT: u8 = 5;
/// VES per USD used when pricing templates in both denominations.
pub const DEFAULT_USD_TO_VES_RATE: i64 = 100;

/// Entry fees accepted at template creation, in USD cents.
pub const ALLOWED_ENTRY_FEES_USD_CENTS: [i64; 5] = [100, 250, 500, 1000, 2000];

/// Immutable engine configuration shared by matchmaking, play, timers, and
/// settlement.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DominoConfig {
    /// Seats per table. The double-six ruleset deals the whole set to 4.
    pub max_players: usize,
    /// Tiles per hand at round start.
    pub hand_size: usize,
    /// Cumulative score that finishes the tournament.
    pub target_score: u32,
    /// Percentage of the prize pool kept by the house.
    pub commission_percent: u8,
    /// VES per USD for dual-denomination entry fees.
    pub usd_to_ves_rate: i64,
    /// Delay before a full table is force-started.
    pub start_game_delay_secs: u64,
    /// Turn timer when the player has at least one legal move.
    pub turn_timeout_secs: u64,
    /// Shorter turn timer when the player can only pass.
    pub pass_timeout_secs: u64,
    /// Pause between a round ending and the next deal.
    pub next_round_delay_secs: u64,
}

impl Default for DominoConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            hand_size: DEFAULT_HAND_SIZE,
            target_score: DEFAULT_TARGET_SCORE,
            commission_percent: DEFAULT_COMMISSION_PERCENT,
            usd_to_ves_rate: DEFAULT_USD_TO_VES_RATE,
            start_game_delay_secs: 60,
            turn_timeout_secs: 30,
            pass_timeout_secs: 10,
            next_round_delay_secs: 15,
        }
    }
}

impl DominoConfig {
    /// Seats per team in partnership mode.
    #[must_use]
    pub const fn team_capacity(&self) -> usize {
        self.max_players / 2
    }

    /// Whether `usd_cents` is an accepted entry fee.
    #[must_use]
    pub fn is_allowed_entry_fee(&self, usd_cents: i64) -> bool {
        ALLOWED_ENTRY_FEES_USD_CENTS.contains(&usd_cents)
    }

    /// Convert a USD-cent fee to VES using the configured rate.
    #[must_use]
    pub const fn fee_in_ves(&self, usd_cents: i64) -> i64 {
        usd_cents * self.usd_to_ves_rate / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_ruleset() {
        let cfg = DominoConfig::default();
        assert_eq!(cfg.max_players * cfg.hand_size, 28);
        assert_eq!(cfg.team_capacity(), 2);
    }

    #[test]
    fn fee_conversion_uses_rate() {
        let cfg = DominoConfig::default();
        assert!(cfg.is_allowed_entry_fee(250));
        assert!(!cfg.is_allowed_entry_fee(300));
        // 2.50 USD at 100 VES/USD.
        assert_eq!(cfg.fee_in_ves(250), 250);
    }
}
