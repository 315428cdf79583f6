//! Dealing, opener selection, and turn-order rotation.
//!
//! Turn order is anti-clockwise: play advances to `(index + n - 1) % n` and
//! the order rotates one seat in the same direction between rounds.

use log::warn;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

use super::board::has_valid_move;
use super::entities::{GameInstance, PlayerSlot, RulesetType, Team, Tile, UserId};
use crate::config::DominoConfig;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum DealError {
    #[error("round start needs exactly {expected} seated players, found {actual}")]
    WrongPlayerCount { expected: usize, actual: usize },
}

/// Everything a fresh round writes back onto the table.
#[derive(Debug)]
pub struct RoundStart {
    pub round_number: u32,
    pub hands: HashMap<UserId, Vec<Tile>>,
    pub boneyard: Vec<Tile>,
    /// Rotated so the opener sits at index 0.
    pub turn_order: Vec<UserId>,
    pub opener: UserId,
    /// The opener holds the double six on the tournament's first round and
    /// must play exactly that tile.
    pub forced_opening: bool,
    pub first_turn_secs: u64,
}

/// Seat after `current`, advancing anti-clockwise.
#[must_use]
pub fn next_seat(turn_order: &[UserId], current: &str) -> Option<UserId> {
    if turn_order.is_empty() {
        return None;
    }
    let n = turn_order.len();
    let index = turn_order.iter().position(|id| id == current).unwrap_or(0);
    Some(turn_order[(index + n - 1) % n].clone())
}

/// Initial order for a table that just filled: join order, or alternating
/// team order `[A1, B1, A2, B2]` in partnership mode.
#[must_use]
pub fn initial_turn_order(players: &[PlayerSlot], ruleset: RulesetType) -> Vec<UserId> {
    let mut by_join: Vec<&PlayerSlot> = players.iter().collect();
    by_join.sort_by_key(|p| p.joined_at);

    if ruleset == RulesetType::Partnership {
        let team_a: Vec<&&PlayerSlot> = by_join
            .iter()
            .filter(|p| p.team == Some(Team::A))
            .collect();
        let team_b: Vec<&&PlayerSlot> = by_join
            .iter()
            .filter(|p| p.team == Some(Team::B))
            .collect();
        if team_a.len() == team_b.len() && !team_a.is_empty() {
            let mut order = Vec::with_capacity(players.len());
            for (a, b) in team_a.iter().zip(team_b.iter()) {
                order.push(a.user_id.clone());
                order.push(b.user_id.clone());
            }
            return order;
        }
        warn!("partnership table has unbalanced teams; falling back to join order");
    }

    by_join.into_iter().map(|p| p.user_id.clone()).collect()
}

/// Opening-player rule over freshly dealt hands.
///
/// First round: the double-six holder opens. Every other round (or if the
/// shuffle somehow produced no double six): the holder of the highest double
/// opens, ties broken by earliest join time; with no doubles at all, the
/// head of the already-rotated order opens.
fn choose_opener(
    is_first_round: bool,
    turn_order: &[UserId],
    players: &[PlayerSlot],
    hands: &HashMap<UserId, Vec<Tile>>,
) -> (UserId, bool) {
    if is_first_round {
        if let Some(holder) = players
            .iter()
            .find(|p| hands[&p.user_id].iter().any(|t| t.same_as(&Tile::double_six())))
        {
            return (holder.user_id.clone(), true);
        }
        // Defensive: a full 4x7 deal always places the double six somewhere.
        warn!("no player holds the double six on the first round; using the double rule");
    }

    let mut best: Option<(&PlayerSlot, u8)> = None;
    for player in players {
        for tile in &hands[&player.user_id] {
            if !tile.is_double() {
                continue;
            }
            let replace = match best {
                None => true,
                Some((current, pip)) => {
                    tile.top > pip || (tile.top == pip && player.joined_at < current.joined_at)
                }
            };
            if replace {
                best = Some((player, tile.top));
            }
        }
    }
    if let Some((player, _)) = best {
        return (player.user_id.clone(), false);
    }

    // Defensive: with the whole set dealt, someone always holds a double.
    warn!("no doubles dealt; falling back to the rotated turn order head");
    (turn_order[0].clone(), false)
}

/// Deal a fresh round for a full table.
///
/// Shuffles the 28-tile set, deals `hand_size` tiles per seat with the
/// hand-to-seat assignment shuffled independently of the turn order, rotates
/// the order one seat anti-clockwise on non-first rounds, picks the opener,
/// and re-rotates so the opener leads.
pub fn start_round<R: Rng + ?Sized>(
    game: &GameInstance,
    players: &[PlayerSlot],
    config: &DominoConfig,
    rng: &mut R,
) -> Result<RoundStart, DealError> {
    if players.len() != game.max_players {
        return Err(DealError::WrongPlayerCount {
            expected: game.max_players,
            actual: players.len(),
        });
    }

    let round_number = game.round_number + 1;
    let is_first_round = round_number == 1;

    let mut deck = Tile::full_set();
    deck.shuffle(rng);

    let mut dealt: Vec<Vec<Tile>> = deck.chunks(config.hand_size).take(players.len()).map(<[Tile]>::to_vec).collect();
    let boneyard: Vec<Tile> = deck.split_off(config.hand_size * players.len());
    dealt.shuffle(rng);

    let hands: HashMap<UserId, Vec<Tile>> = players
        .iter()
        .map(|p| p.user_id.clone())
        .zip(dealt)
        .collect();

    let mut turn_order = if game.turn_order.len() == game.max_players {
        game.turn_order.clone()
    } else {
        warn!(
            "game {} has an invalid turn order; reconstructing from join order",
            game.id
        );
        initial_turn_order(players, game.ruleset)
    };

    if !is_first_round {
        // [A, B, C, D] -> [D, A, B, C]
        turn_order.rotate_right(1);
    }

    let (opener, forced_opening) = choose_opener(is_first_round, &turn_order, players, &hands);

    if let Some(index) = turn_order.iter().position(|id| *id == opener) {
        turn_order.rotate_left(index);
    } else {
        // Defensive recovery path; the opener always comes from the seated
        // players, which the order is reconstructed from above.
        warn!(
            "opener {opener} missing from turn order of game {}; prepending",
            game.id
        );
        turn_order.insert(0, opener.clone());
        turn_order.truncate(game.max_players);
    }

    let first_turn_secs = if forced_opening || has_valid_move(&hands[&opener], &[]) {
        config.turn_timeout_secs
    } else {
        config.pass_timeout_secs
    };

    Ok(RoundStart {
        round_number,
        hands,
        boneyard,
        turn_order,
        opener,
        forced_opening,
        first_turn_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{GameStatus, TemplateStatus, TournamentTemplate};
    use chrono::{Duration, Utc};

    fn template(ruleset: RulesetType) -> TournamentTemplate {
        TournamentTemplate {
            id: "tpl".into(),
            name: "test".into(),
            ruleset,
            entry_fee_usd_cents: 100,
            entry_fee_ves: 100,
            status: TemplateStatus::Open,
            max_players: 4,
            target_score: 100,
            created_by: "admin".into(),
            created_at: Utc::now(),
        }
    }

    fn seated(ruleset: RulesetType) -> (GameInstance, Vec<PlayerSlot>) {
        let template = template(ruleset);
        let mut game = GameInstance::open_table(&template);
        let teams = match ruleset {
            RulesetType::Partnership => {
                vec![Some(Team::A), Some(Team::B), Some(Team::A), Some(Team::B)]
            }
            RulesetType::Individual => vec![None; 4],
        };
        let base = Utc::now();
        let players: Vec<PlayerSlot> = teams
            .into_iter()
            .enumerate()
            .map(|(i, team)| {
                let mut slot =
                    PlayerSlot::new(format!("p{}", i + 1), format!("player{}", i + 1), team);
                slot.joined_at = base + Duration::seconds(i as i64);
                slot
            })
            .collect();
        game.player_count = 4;
        game.status = GameStatus::Full;
        game.turn_order = players.iter().map(|p| p.user_id.clone()).collect();
        (game, players)
    }

    #[test]
    fn next_seat_advances_anti_clockwise() {
        let order: Vec<UserId> = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        assert_eq!(next_seat(&order, "a").unwrap(), "d");
        assert_eq!(next_seat(&order, "d").unwrap(), "c");
        assert_eq!(next_seat(&order, "b").unwrap(), "a");
        assert!(next_seat(&[], "a").is_none());
    }

    #[test]
    fn partnership_order_alternates_teams() {
        let (_, players) = seated(RulesetType::Partnership);
        let order = initial_turn_order(&players, RulesetType::Partnership);
        assert_eq!(order, vec!["p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn first_round_deal_conserves_tiles_and_forces_double_six() {
        let (game, players) = seated(RulesetType::Individual);
        let mut rng = rand::rng();
        let round = start_round(&game, &players, &DominoConfig::default(), &mut rng).unwrap();

        assert_eq!(round.round_number, 1);
        assert!(round.boneyard.is_empty());
        let mut all: Vec<Tile> = round.hands.values().flatten().copied().collect();
        all.extend(&round.boneyard);
        assert_eq!(all.len(), 28);
        for tile in Tile::full_set() {
            assert_eq!(
                all.iter().filter(|t| t.same_as(&tile)).count(),
                1,
                "{tile} not dealt exactly once"
            );
        }

        assert!(round.forced_opening);
        assert!(
            round.hands[&round.opener]
                .iter()
                .any(|t| t.same_as(&Tile::double_six()))
        );
        assert_eq!(round.turn_order[0], round.opener);
        assert_eq!(round.first_turn_secs, 30);
    }

    #[test]
    fn later_rounds_rotate_and_use_highest_double() {
        let (mut game, players) = seated(RulesetType::Individual);
        game.round_number = 1;
        let mut rng = rand::rng();
        let round = start_round(&game, &players, &DominoConfig::default(), &mut rng).unwrap();

        assert_eq!(round.round_number, 2);
        assert!(!round.forced_opening);
        assert_eq!(round.turn_order[0], round.opener);
        assert_eq!(round.turn_order.len(), 4);

        // The opener holds the highest double dealt anywhere.
        let opener_best = round.hands[&round.opener]
            .iter()
            .filter(|t| t.is_double())
            .map(|t| t.top)
            .max()
            .expect("full deal always gives the opener rule a double");
        for hand in round.hands.values() {
            for tile in hand {
                if tile.is_double() {
                    assert!(tile.top <= opener_best);
                }
            }
        }
    }

    #[test]
    fn rotation_moves_last_seat_to_front() {
        let mut order: Vec<UserId> = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        order.rotate_right(1);
        assert_eq!(order, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn short_table_cannot_deal() {
        let (game, mut players) = seated(RulesetType::Individual);
        players.pop();
        let mut rng = rand::rng();
        let err = start_round(&game, &players, &DominoConfig::default(), &mut rng).unwrap_err();
        assert_eq!(
            err,
            DealError::WrongPlayerCount {
                expected: 4,
                actual: 3
            }
        );
    }
}
