//! Board and move legality.
//!
//! The board is an ordered tile sequence. `board[0].top` is the start open
//! end and `board.last().bottom` is the end open end; tiles are flipped as
//! needed on placement so those two fields always describe the frontier.

use super::entities::{Move, Tile, TilePosition};

/// Open pip values at the start and end of a non-empty board.
#[must_use]
pub fn open_ends(board: &[Tile]) -> Option<(u8, u8)> {
    let first = board.first()?;
    let last = board.last()?;
    Some((first.top, last.bottom))
}

/// Every legal move for `hand` against `board`.
///
/// An empty board makes every hand tile playable at `start`. A tile matching
/// both ends is listed at both positions unless the ends are equal, in which
/// case the sides are equivalent and it is listed once at `start`.
#[must_use]
pub fn valid_moves(hand: &[Tile], board: &[Tile]) -> Vec<Move> {
    let Some((start_value, end_value)) = open_ends(board) else {
        return hand
            .iter()
            .map(|&tile| Move {
                tile,
                position: TilePosition::Start,
            })
            .collect();
    };

    let mut moves = Vec::new();
    for &tile in hand {
        let can_start = tile.contains(start_value);
        let can_end = tile.contains(end_value);
        if can_start {
            moves.push(Move {
                tile,
                position: TilePosition::Start,
            });
        }
        if can_end && (!can_start || start_value != end_value) {
            moves.push(Move {
                tile,
                position: TilePosition::End,
            });
        }
    }
    moves
}

#[must_use]
pub fn has_valid_move(hand: &[Tile], board: &[Tile]) -> bool {
    let Some((start_value, end_value)) = open_ends(board) else {
        return !hand.is_empty();
    };
    hand.iter()
        .any(|tile| tile.contains(start_value) || tile.contains(end_value))
}

/// The forced opening move if `hand` holds the double six, applicable only
/// on the first round's empty board.
#[must_use]
pub fn forced_opening_move(hand: &[Tile]) -> Option<Move> {
    hand.iter()
        .find(|tile| tile.same_as(&Tile::double_six()))
        .map(|&tile| Move {
            tile,
            position: TilePosition::Start,
        })
}

/// Errors from applying a move to a board.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("tile is not in the hand")]
    TileNotInHand,
    #[error("tile does not match the open end")]
    IllegalPlacement,
}

/// Remove `mv.tile` from `hand` and place it on `board`, flipping it so the
/// matching pip touches the existing end. An empty board takes the tile in
/// its natural orientation.
pub fn apply_move(board: &mut Vec<Tile>, hand: &mut Vec<Tile>, mv: &Move) -> Result<(), BoardError> {
    let index = hand
        .iter()
        .position(|tile| tile.same_as(&mv.tile))
        .ok_or(BoardError::TileNotInHand)?;
    let tile = hand[index];

    let Some((start_value, end_value)) = open_ends(board) else {
        hand.remove(index);
        board.push(tile);
        return Ok(());
    };

    match mv.position {
        TilePosition::Start => {
            if !tile.contains(start_value) {
                return Err(BoardError::IllegalPlacement);
            }
            let oriented = if tile.bottom == start_value {
                tile
            } else {
                tile.flipped()
            };
            hand.remove(index);
            board.insert(0, oriented);
        }
        TilePosition::End => {
            if !tile.contains(end_value) {
                return Err(BoardError::IllegalPlacement);
            }
            let oriented = if tile.top == end_value {
                tile
            } else {
                tile.flipped()
            };
            hand.remove(index);
            board.push(oriented);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tile(top: u8, bottom: u8) -> Tile {
        Tile::new(top, bottom)
    }

    #[test]
    fn empty_board_allows_every_tile_at_start() {
        let hand = vec![tile(0, 0), tile(3, 5)];
        let moves = valid_moves(&hand, &[]);
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(|m| m.position == TilePosition::Start));
    }

    #[test]
    fn moves_match_open_ends_only() {
        // Board: 2|4, 4|5 -> open ends are 2 (start) and 5 (end).
        let board = vec![tile(2, 4), tile(4, 5)];
        let hand = vec![tile(2, 6), tile(5, 5), tile(3, 3)];
        let moves = valid_moves(&hand, &board);
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&Move {
            tile: tile(2, 6),
            position: TilePosition::Start
        }));
        assert!(moves.contains(&Move {
            tile: tile(5, 5),
            position: TilePosition::End
        }));
    }

    #[test]
    fn tile_matching_both_ends_listed_twice() {
        // Open ends 2 and 5; 2|5 plays at both.
        let board = vec![tile(2, 4), tile(4, 5)];
        let moves = valid_moves(&[tile(2, 5)], &board);
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn equal_open_ends_list_once_at_start() {
        // Board: 3|4, 4|3 -> both ends are 3.
        let board = vec![tile(3, 4), tile(4, 3)];
        let moves = valid_moves(&[tile(3, 6)], &board);
        assert_eq!(
            moves,
            vec![Move {
                tile: tile(3, 6),
                position: TilePosition::Start
            }]
        );
    }

    #[test]
    fn apply_orients_tile_to_touch_start() {
        let mut board = vec![tile(2, 4)];
        let mut hand = vec![tile(2, 6)];
        apply_move(
            &mut board,
            &mut hand,
            &Move {
                tile: tile(2, 6),
                position: TilePosition::Start,
            },
        )
        .unwrap();
        // Prepended tile's bottom must equal the old start value.
        assert_eq!(board[0], tile(6, 2));
        assert!(hand.is_empty());
    }

    #[test]
    fn apply_orients_tile_to_touch_end() {
        let mut board = vec![tile(2, 4)];
        let mut hand = vec![tile(6, 4)];
        apply_move(
            &mut board,
            &mut hand,
            &Move {
                tile: tile(6, 4),
                position: TilePosition::End,
            },
        )
        .unwrap();
        assert_eq!(board[1], tile(4, 6));
    }

    #[test]
    fn apply_accepts_flipped_submission() {
        // Player submits 4|6 but holds it as 6|4.
        let mut board = vec![tile(2, 4)];
        let mut hand = vec![tile(6, 4)];
        let result = apply_move(
            &mut board,
            &mut hand,
            &Move {
                tile: tile(4, 6),
                position: TilePosition::End,
            },
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn apply_rejects_missing_or_mismatched_tiles() {
        let mut board = vec![tile(2, 4)];
        let mut hand = vec![tile(1, 1)];
        let err = apply_move(
            &mut board,
            &mut hand,
            &Move {
                tile: tile(3, 3),
                position: TilePosition::End,
            },
        )
        .unwrap_err();
        assert_eq!(err, BoardError::TileNotInHand);

        let err = apply_move(
            &mut board,
            &mut hand,
            &Move {
                tile: tile(1, 1),
                position: TilePosition::End,
            },
        )
        .unwrap_err();
        assert_eq!(err, BoardError::IllegalPlacement);
        assert_eq!(hand.len(), 1);
    }

    #[test]
    fn forced_opening_finds_double_six() {
        assert!(forced_opening_move(&[tile(1, 2)]).is_none());
        let mv = forced_opening_move(&[tile(1, 2), tile(6, 6)]).unwrap();
        assert_eq!(mv.tile, Tile::double_six());
        assert_eq!(mv.position, TilePosition::Start);
    }

    fn arb_tile() -> impl Strategy<Value = Tile> {
        (0u8..=6, 0u8..=6).prop_map(|(a, b)| Tile::new(a, b))
    }

    proptest! {
        // Soundness and completeness: a tile is listed iff it matches an
        // open end, and every listed move applies cleanly.
        #[test]
        fn valid_moves_are_exactly_the_matching_tiles(
            hand in proptest::collection::vec(arb_tile(), 0..7),
            board in proptest::collection::vec(arb_tile(), 1..10),
        ) {
            let (start_value, end_value) = open_ends(&board).unwrap();
            let moves = valid_moves(&hand, &board);

            for tile in &hand {
                let listed = moves.iter().filter(|m| m.tile == *tile).count();
                let matches = usize::from(tile.contains(start_value))
                    + usize::from(tile.contains(end_value) && start_value != end_value)
                    + usize::from(
                        tile.contains(end_value)
                            && start_value == end_value
                            && !tile.contains(start_value),
                    );
                // Duplicated hand tiles multiply listings; compare per-copy.
                let copies = hand.iter().filter(|t| *t == tile).count();
                prop_assert_eq!(listed, matches * copies);
            }

            for mv in &moves {
                let mut b = board.clone();
                let mut h = hand.clone();
                prop_assert_eq!(apply_move(&mut b, &mut h, mv), Ok(()));
                prop_assert_eq!(b.len(), board.len() + 1);
                prop_assert_eq!(h.len(), hand.len() - 1);
                // The frontier stays consistent after placement.
                let (new_start, new_end) = open_ends(&b).unwrap();
                match mv.position {
                    TilePosition::Start => {
                        prop_assert_eq!(b[0].bottom, start_value);
                        prop_assert_eq!(new_end, end_value);
                    }
                    TilePosition::End => {
                        prop_assert_eq!(b[b.len() - 1].top, end_value);
                        prop_assert_eq!(new_start, start_value);
                    }
                }
            }
        }
    }
}
