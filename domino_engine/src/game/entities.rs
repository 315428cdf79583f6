//! Core domino entities and stored documents.
//!
//! Everything the engine persists is defined here as a serde document:
//! tournament templates, game instances, player slots, user profiles, and
//! the payout/transaction records written at settlement time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Highest pip on a double-six tile.
pub const MAX_PIP: u8 = 6;
/// Tiles in the double-six set.
pub const TILE_SET_SIZE: usize = 28;

pub type UserId = String;
pub type GameId = String;
pub type TemplateId = String;

/// A domino tile: an unordered pair of pips in `[0, 6]`.
///
/// Orientation only matters once a tile sits on the board, where `top` faces
/// the start end and `bottom` faces the end end.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Tile {
    pub top: u8,
    pub bottom: u8,
}

impl Tile {
    #[must_use]
    pub const fn new(top: u8, bottom: u8) -> Self {
        Self { top, bottom }
    }

    /// Score unit for losing hands.
    #[must_use]
    pub const fn pip_value(&self) -> u32 {
        self.top as u32 + self.bottom as u32
    }

    #[must_use]
    pub const fn is_double(&self) -> bool {
        self.top == self.bottom
    }

    #[must_use]
    pub const fn contains(&self, pip: u8) -> bool {
        self.top == pip || self.bottom == pip
    }

    /// The same tile with its ends swapped.
    #[must_use]
    pub const fn flipped(&self) -> Self {
        Self {
            top: self.bottom,
            bottom: self.top,
        }
    }

    /// Tiles are unordered pairs: `6|3` and `3|6` are the same tile.
    #[must_use]
    pub const fn same_as(&self, other: &Self) -> bool {
        (self.top == other.top && self.bottom == other.bottom)
            || (self.top == other.bottom && self.bottom == other.top)
    }

    /// The forced opening tile for a tournament's first round.
    #[must_use]
    pub const fn double_six() -> Self {
        Self::new(MAX_PIP, MAX_PIP)
    }

    /// The complete 28-tile double-six set.
    #[must_use]
    pub fn full_set() -> Vec<Self> {
        let mut set = Vec::with_capacity(TILE_SET_SIZE);
        for top in 0..=MAX_PIP {
            for bottom in top..=MAX_PIP {
                set.push(Self::new(top, bottom));
            }
        }
        set
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.top, self.bottom)
    }
}

/// Sum of pip values across a hand.
#[must_use]
pub fn hand_pip_sum(hand: &[Tile]) -> u32 {
    hand.iter().map(Tile::pip_value).sum()
}

/// Partnership team.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    A,
    B,
}

impl Team {
    /// Key under which this team's cumulative score is stored.
    #[must_use]
    pub const fn score_key(&self) -> &'static str {
        match self {
            Self::A => "team_a",
            Self::B => "team_b",
        }
    }

    #[must_use]
    pub const fn opponent(&self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Which open end of the board a tile is played against.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TilePosition {
    Start,
    End,
}

/// A candidate or submitted play.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Move {
    pub tile: Tile,
    pub position: TilePosition,
}

/// Ruleset variants of the double-six tournament.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesetType {
    /// Four players, all vs all.
    Individual,
    /// 2v2 with alternating seating.
    Partnership,
}

/// Table lifecycle states.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Full,
    Playing,
    RoundOver,
    Finished,
}

/// Whether a template accepts new entries.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    Open,
    Closed,
}

/// Administrative tournament template. Immutable after creation except for
/// administrative edits; games reference it by id.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TournamentTemplate {
    pub id: TemplateId,
    pub name: String,
    pub ruleset: RulesetType,
    /// Entry fee in USD cents (display denomination).
    pub entry_fee_usd_cents: i64,
    /// Entry fee in VES (the denomination all money moves in).
    pub entry_fee_ves: i64,
    pub status: TemplateStatus,
    pub max_players: usize,
    pub target_score: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A seated player: child document of a game instance.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerSlot {
    pub user_id: UserId,
    pub username: String,
    pub team: Option<Team>,
    pub hand: Vec<Tile>,
    /// Mirrors the game-level score for this player (or their team).
    pub score: u32,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl PlayerSlot {
    #[must_use]
    pub fn new(user_id: UserId, username: String, team: Option<Team>) -> Self {
        Self {
            user_id,
            username,
            team,
            hand: Vec::new(),
            score: 0,
            is_ready: false,
            joined_at: Utc::now(),
        }
    }

    /// Key under which this player's cumulative score is tracked: the team
    /// key in partnership mode, the user id otherwise.
    #[must_use]
    pub fn score_key(&self) -> String {
        match self.team {
            Some(team) => team.score_key().to_string(),
            None => self.user_id.clone(),
        }
    }
}

/// What the last action on a table was, kept for clients and audit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveAction {
    Play,
    Pass,
    AutoPlay,
    AutoPass,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LastMove {
    pub user_id: UserId,
    pub action: MoveAction,
    pub tile: Option<Tile>,
    pub position: Option<TilePosition>,
    pub at: DateTime<Utc>,
}

/// A running (or finished) table.
///
/// Invariant while `status == Playing`: the multiset union of `board`, every
/// seated hand, and `boneyard` is exactly the 28-tile double-six set.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameInstance {
    pub id: GameId,
    pub template_id: TemplateId,
    pub name: String,
    pub ruleset: RulesetType,
    pub entry_fee_ves: i64,
    pub status: GameStatus,
    pub max_players: usize,
    pub target_score: u32,
    pub player_count: usize,
    pub prize_pool_ves: i64,
    /// Anti-clockwise seating order; empty until the table first fills.
    pub turn_order: Vec<UserId>,
    pub current_turn: Option<UserId>,
    pub turn_timeout_seconds: Option<u64>,
    pub turn_deadline: Option<DateTime<Utc>>,
    /// Ordered tile sequence; `board[0].top` and `board.last().bottom` are
    /// the open ends.
    pub board: Vec<Tile>,
    /// Undealt tiles. Empty under the standard 4x7 deal, tracked for the
    /// conservation invariant.
    pub boneyard: Vec<Tile>,
    /// Cumulative scores keyed by user id (individual) or team key.
    pub scores: HashMap<String, u32>,
    pub pass_count: usize,
    /// 0 until the first deal; the first round is round 1.
    pub round_number: u32,
    pub last_move: Option<LastMove>,
    /// Round winner (domino-out) or `None` for a tranque with no winner.
    pub winner: Option<UserId>,
    pub winning_team: Option<Team>,
    /// Live start-delay / next-round task, if any.
    pub scheduled_start_id: Option<String>,
    /// Live turn-timeout task, if any.
    pub scheduled_timer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameInstance {
    /// A fresh waiting table for `template`.
    #[must_use]
    pub fn open_table(template: &TournamentTemplate) -> Self {
        let scores = match template.ruleset {
            RulesetType::Partnership => HashMap::from([
                (Team::A.score_key().to_string(), 0),
                (Team::B.score_key().to_string(), 0),
            ]),
            RulesetType::Individual => HashMap::new(),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            name: template.name.clone(),
            ruleset: template.ruleset,
            entry_fee_ves: template.entry_fee_ves,
            status: GameStatus::Waiting,
            max_players: template.max_players,
            target_score: template.target_score,
            player_count: 0,
            prize_pool_ves: 0,
            turn_order: Vec::new(),
            current_turn: None,
            turn_timeout_seconds: None,
            turn_deadline: None,
            board: Vec::new(),
            boneyard: Vec::new(),
            scores,
            pass_count: 0,
            round_number: 0,
            last_move: None,
            winner: None,
            winning_team: None,
            scheduled_start_id: None,
            scheduled_timer_id: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the tournament has dealt its first round yet. The forced
    /// double-six opening only applies while this is true.
    #[must_use]
    pub fn is_first_round(&self) -> bool {
        self.round_number <= 1
    }

    #[must_use]
    pub fn score_for(&self, key: &str) -> u32 {
        self.scores.get(key).copied().unwrap_or(0)
    }

    /// Clear all per-turn fields when a round or the tournament ends.
    pub fn clear_turn(&mut self) {
        self.current_turn = None;
        self.turn_timeout_seconds = None;
        self.turn_deadline = None;
        self.scheduled_timer_id = None;
    }
}

/// Reference to a table a user is seated at.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActiveGameRef {
    pub game_id: GameId,
    pub template_id: TemplateId,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Player,
    Admin,
}

/// User profile document. Balances live in the external ledger; this only
/// tracks identity, role, and active-table references.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub role: UserRole,
    pub active_games: Vec<ActiveGameRef>,
}

impl UserProfile {
    #[must_use]
    pub fn is_enrolled_in(&self, template_id: &str) -> bool {
        self.active_games.iter().any(|g| g.template_id == template_id)
    }
}

/// Payout ledger record written once per finished tournament.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PayoutRecord {
    pub game_id: GameId,
    pub ruleset: RulesetType,
    pub winners: Vec<UserId>,
    pub winning_team: Option<Team>,
    pub total_prize_ves: i64,
    pub commission_ves: i64,
    pub net_prize_ves: i64,
    pub prize_per_winner_ves: i64,
    pub final_scores: HashMap<String, u32>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryTxKind {
    Buy,
    Refund,
}

/// Audit record for an entry purchase or refund.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EntryTransaction {
    pub id: String,
    pub kind: EntryTxKind,
    pub amount_ves: i64,
    pub user_id: UserId,
    pub game_id: GameId,
    pub template_id: TemplateId,
    pub at: DateTime<Utc>,
}

impl EntryTransaction {
    #[must_use]
    pub fn record(kind: EntryTxKind, amount_ves: i64, user_id: &str, game: &GameInstance) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            amount_ves,
            user_id: user_id.to_string(),
            game_id: game.id.clone(),
            template_id: game.template_id.clone(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_set_has_28_unique_tiles() {
        let set = Tile::full_set();
        assert_eq!(set.len(), TILE_SET_SIZE);
        for (i, a) in set.iter().enumerate() {
            for b in &set[i + 1..] {
                assert!(!a.same_as(b), "{a} duplicated as {b}");
            }
        }
    }

    #[test]
    fn pip_value_and_doubles() {
        assert_eq!(Tile::new(6, 3).pip_value(), 9);
        assert!(Tile::new(4, 4).is_double());
        assert!(!Tile::new(4, 5).is_double());
        assert_eq!(hand_pip_sum(&[Tile::new(6, 6), Tile::new(0, 1)]), 13);
    }

    #[test]
    fn tiles_are_unordered_pairs() {
        assert!(Tile::new(6, 3).same_as(&Tile::new(3, 6)));
        assert!(!Tile::new(6, 3).same_as(&Tile::new(6, 4)));
    }

    #[test]
    fn score_key_prefers_team() {
        let mut slot = PlayerSlot::new("u1".into(), "ana".into(), Some(Team::B));
        assert_eq!(slot.score_key(), "team_b");
        slot.team = None;
        assert_eq!(slot.score_key(), "u1");
    }

    #[test]
    fn open_table_seeds_partnership_scores() {
        let template = TournamentTemplate {
            id: "t1".into(),
            name: "2v2".into(),
            ruleset: RulesetType::Partnership,
            entry_fee_usd_cents: 100,
            entry_fee_ves: 100,
            status: TemplateStatus::Open,
            max_players: 4,
            target_score: 100,
            created_by: "admin".into(),
            created_at: Utc::now(),
        };
        let game = GameInstance::open_table(&template);
        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(game.score_for("team_a"), 0);
        assert_eq!(game.score_for("team_b"), 0);
        assert_eq!(game.round_number, 0);
    }
}
