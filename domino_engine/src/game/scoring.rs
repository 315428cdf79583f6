//! Round resolution and prize arithmetic.
//!
//! Rounds end either by domino-out (a hand emptied) or by tranque (blocked
//! board). Round points are the pip-sum of all losing hands, credited to the
//! winner's cumulative score; a tranque tie awards nothing.

use log::warn;
use std::collections::HashMap;

use super::entities::{GameInstance, PlayerSlot, RulesetType, Team, UserId, hand_pip_sum};

/// Who took the round.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoundWinner {
    Player(UserId),
    Team(Team),
}

/// Outcome of a finished round, before it is written back to the table.
#[derive(Clone, Debug)]
pub struct RoundResolution {
    pub winner: Option<RoundWinner>,
    /// Representative winner id stored on the game document (any member of
    /// the winning team in partnership mode).
    pub winner_id: Option<UserId>,
    pub points: u32,
    pub new_scores: HashMap<String, u32>,
    pub target_reached: bool,
}

fn hand_sums(players: &[PlayerSlot]) -> HashMap<UserId, u32> {
    players
        .iter()
        .map(|p| (p.user_id.clone(), hand_pip_sum(&p.hand)))
        .collect()
}

fn finish(
    game: &GameInstance,
    players: &[PlayerSlot],
    winner: Option<RoundWinner>,
) -> RoundResolution {
    let sums = hand_sums(players);

    let (winner_id, losers): (Option<UserId>, Vec<&PlayerSlot>) = match &winner {
        Some(RoundWinner::Player(id)) => (
            Some(id.clone()),
            players.iter().filter(|p| p.user_id != *id).collect(),
        ),
        Some(RoundWinner::Team(team)) => (
            players
                .iter()
                .find(|p| p.team == Some(*team))
                .map(|p| p.user_id.clone()),
            players.iter().filter(|p| p.team != Some(*team)).collect(),
        ),
        None => (None, Vec::new()),
    };

    let raw_points: i64 = losers.iter().map(|p| i64::from(sums[&p.user_id])).sum();
    // The pip arithmetic cannot go negative; the clamp is a safety net only.
    let points = if raw_points < 0 {
        warn!("negative round points ({raw_points}) clamped to 0");
        0
    } else {
        raw_points as u32
    };

    let mut new_scores = game.scores.clone();
    let mut target_reached = false;
    if points > 0 {
        if let Some(winner) = &winner {
            let key = match winner {
                RoundWinner::Player(id) => id.clone(),
                RoundWinner::Team(team) => team.score_key().to_string(),
            };
            let total = new_scores.get(&key).copied().unwrap_or(0) + points;
            new_scores.insert(key, total);
            target_reached = total >= game.target_score;
        }
    }

    RoundResolution {
        winner,
        winner_id,
        points,
        new_scores,
        target_reached,
    }
}

/// Resolve a round won by emptying a hand.
#[must_use]
pub fn resolve_domino_out(
    game: &GameInstance,
    players: &[PlayerSlot],
    winner_id: &str,
) -> RoundResolution {
    let winner = match game.ruleset {
        RulesetType::Partnership => players
            .iter()
            .find(|p| p.user_id == winner_id)
            .and_then(|p| p.team)
            .map(RoundWinner::Team)
            .unwrap_or_else(|| RoundWinner::Player(winner_id.to_string())),
        RulesetType::Individual => RoundWinner::Player(winner_id.to_string()),
    };
    finish(game, players, Some(winner))
}

/// Resolve a blocked round. The lowest hand pip-sum wins (per team in
/// partnership mode); a tie for lowest means no winner and no points.
#[must_use]
pub fn resolve_tranque(game: &GameInstance, players: &[PlayerSlot]) -> RoundResolution {
    let sums = hand_sums(players);

    let winner = match game.ruleset {
        RulesetType::Partnership => {
            let team_sum = |team: Team| -> u32 {
                players
                    .iter()
                    .filter(|p| p.team == Some(team))
                    .map(|p| sums[&p.user_id])
                    .sum()
            };
            let a = team_sum(Team::A);
            let b = team_sum(Team::B);
            if a < b {
                Some(RoundWinner::Team(Team::A))
            } else if b < a {
                Some(RoundWinner::Team(Team::B))
            } else {
                None
            }
        }
        RulesetType::Individual => {
            let min = sums.values().copied().min().unwrap_or(0);
            let lowest: Vec<&PlayerSlot> = players
                .iter()
                .filter(|p| sums[&p.user_id] == min)
                .collect();
            if lowest.len() == 1 {
                Some(RoundWinner::Player(lowest[0].user_id.clone()))
            } else {
                None
            }
        }
    };

    finish(game, players, winner)
}

/// Net prize arithmetic at settlement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PayoutSplit {
    pub total: i64,
    pub commission: i64,
    pub net: i64,
    pub per_winner: i64,
}

/// Split the pool: commission off the top, the rest divided evenly. Integer
/// division; any sub-unit remainder stays with the house.
#[must_use]
pub fn split_prize(total: i64, commission_percent: u8, winner_count: usize) -> PayoutSplit {
    let commission = total * i64::from(commission_percent) / 100;
    let net = total - commission;
    let per_winner = if winner_count == 0 || net <= 0 {
        0
    } else {
        net / winner_count as i64
    };
    PayoutSplit {
        total,
        commission,
        net,
        per_winner,
    }
}

/// Tournament winners once the target score is reached: the members of the
/// winning team, or the individual player(s) holding the highest qualifying
/// score.
#[must_use]
pub fn tournament_winners(
    game: &GameInstance,
    players: &[PlayerSlot],
    scores: &HashMap<String, u32>,
) -> (Vec<UserId>, Option<Team>) {
    match game.ruleset {
        RulesetType::Partnership => {
            let a = scores.get(Team::A.score_key()).copied().unwrap_or(0);
            let b = scores.get(Team::B.score_key()).copied().unwrap_or(0);
            let winning_team = if a >= game.target_score && b >= game.target_score {
                Some(if a >= b { Team::A } else { Team::B })
            } else if a >= game.target_score {
                Some(Team::A)
            } else if b >= game.target_score {
                Some(Team::B)
            } else {
                None
            };
            let winners = winning_team
                .map(|team| {
                    players
                        .iter()
                        .filter(|p| p.team == Some(team))
                        .map(|p| p.user_id.clone())
                        .collect()
                })
                .unwrap_or_default();
            (winners, winning_team)
        }
        RulesetType::Individual => {
            let mut best = 0u32;
            let mut winners: Vec<UserId> = Vec::new();
            for player in players {
                let score = scores.get(&player.user_id).copied().unwrap_or(0);
                if score < game.target_score {
                    continue;
                }
                if score > best {
                    best = score;
                    winners = vec![player.user_id.clone()];
                } else if score == best {
                    winners.push(player.user_id.clone());
                }
            }
            (winners, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{TemplateStatus, Tile, TournamentTemplate};
    use chrono::Utc;

    fn make_game(ruleset: RulesetType) -> GameInstance {
        let template = TournamentTemplate {
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
        };
        GameInstance::open_table(&template)
    }

    fn slot(id: &str, team: Option<Team>, hand: Vec<Tile>) -> PlayerSlot {
        let mut slot = PlayerSlot::new(id.into(), id.into(), team);
        slot.hand = hand;
        slot
    }

    #[test]
    fn domino_out_scores_losers_pips() {
        let game = make_game(RulesetType::Individual);
        let players = vec![
            slot("p1", None, vec![]),
            slot("p2", None, vec![Tile::new(1, 2)]),
            slot("p3", None, vec![Tile::new(3, 4)]),
            slot("p4", None, vec![Tile::new(5, 6)]),
        ];
        let resolution = resolve_domino_out(&game, &players, "p1");
        assert_eq!(resolution.winner, Some(RoundWinner::Player("p1".into())));
        assert_eq!(resolution.points, 3 + 7 + 11);
        assert_eq!(resolution.new_scores["p1"], 21);
        assert!(!resolution.target_reached);
    }

    #[test]
    fn domino_out_reaching_target() {
        let mut game = make_game(RulesetType::Individual);
        game.scores.insert("p1".into(), 90);
        let players = vec![
            slot("p1", None, vec![]),
            slot("p2", None, vec![Tile::new(6, 6)]),
            slot("p3", None, vec![]),
            slot("p4", None, vec![]),
        ];
        let resolution = resolve_domino_out(&game, &players, "p1");
        assert_eq!(resolution.new_scores["p1"], 102);
        assert!(resolution.target_reached);
    }

    #[test]
    fn individual_tranque_tie_awards_nothing() {
        let game = make_game(RulesetType::Individual);
        // p1 and p2 tie for the lowest sum (3).
        let players = vec![
            slot("p1", None, vec![Tile::new(1, 2)]),
            slot("p2", None, vec![Tile::new(0, 3)]),
            slot("p3", None, vec![Tile::new(4, 4)]),
            slot("p4", None, vec![Tile::new(6, 5)]),
        ];
        let resolution = resolve_tranque(&game, &players);
        assert_eq!(resolution.winner, None);
        assert_eq!(resolution.points, 0);
        assert_eq!(resolution.new_scores, game.scores);
    }

    #[test]
    fn partnership_tranque_scores_losing_team_sum() {
        let game = make_game(RulesetType::Partnership);
        // Team A sums to 6, team B to 14; B's sum is the round points.
        let players = vec![
            slot("a1", Some(Team::A), vec![Tile::new(1, 1)]),
            slot("b1", Some(Team::B), vec![Tile::new(4, 4)]),
            slot("a2", Some(Team::A), vec![Tile::new(2, 2)]),
            slot("b2", Some(Team::B), vec![Tile::new(3, 3)]),
        ];
        let resolution = resolve_tranque(&game, &players);
        assert_eq!(resolution.winner, Some(RoundWinner::Team(Team::A)));
        assert_eq!(resolution.points, 14);
        assert_eq!(resolution.new_scores["team_a"], 14);
        assert_eq!(resolution.new_scores["team_b"], 0);
    }

    #[test]
    fn partnership_tranque_tie_awards_nothing() {
        let game = make_game(RulesetType::Partnership);
        let players = vec![
            slot("a1", Some(Team::A), vec![Tile::new(2, 2)]),
            slot("b1", Some(Team::B), vec![Tile::new(1, 3)]),
            slot("a2", Some(Team::A), vec![]),
            slot("b2", Some(Team::B), vec![]),
        ];
        let resolution = resolve_tranque(&game, &players);
        assert_eq!(resolution.winner, None);
        assert_eq!(resolution.points, 0);
    }

    #[test]
    fn prize_split_takes_commission_then_divides() {
        // Scenario D: pool 400, 5% commission, two winners.
        let split = split_prize(400, 5, 2);
        assert_eq!(split.commission, 20);
        assert_eq!(split.net, 380);
        assert_eq!(split.per_winner, 190);

        let empty = split_prize(400, 5, 0);
        assert_eq!(empty.per_winner, 0);
    }

    #[test]
    fn partnership_winners_are_whole_team() {
        let game = make_game(RulesetType::Partnership);
        let players = vec![
            slot("a1", Some(Team::A), vec![]),
            slot("b1", Some(Team::B), vec![]),
            slot("a2", Some(Team::A), vec![]),
            slot("b2", Some(Team::B), vec![]),
        ];
        let scores = HashMap::from([("team_a".to_string(), 104u32), ("team_b".to_string(), 60)]);
        let (winners, team) = tournament_winners(&game, &players, &scores);
        assert_eq!(team, Some(Team::A));
        assert_eq!(winners, vec!["a1", "a2"]);
    }

    #[test]
    fn individual_winner_needs_target_score() {
        let game = make_game(RulesetType::Individual);
        let players = vec![
            slot("p1", None, vec![]),
            slot("p2", None, vec![]),
            slot("p3", None, vec![]),
            slot("p4", None, vec![]),
        ];
        let scores = HashMap::from([
            ("p1".to_string(), 102u32),
            ("p2".to_string(), 99),
            ("p3".to_string(), 40),
        ]);
        let (winners, team) = tournament_winners(&game, &players, &scores);
        assert_eq!(winners, vec!["p1"]);
        assert_eq!(team, None);
    }
}
