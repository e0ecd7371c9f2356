//! End-of-game tabulation: majority colours, point totals and the winner.
//!
//! Parade is a loss-minimization game: majority-colour cards flip face
//! down and count one point each, everything else counts face value, and
//! the lowest total wins.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cards::{Card, Colour};
use crate::player::Player;

/// Result of the winner declaration. Callers must handle all three shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    /// One player had the strictly lowest score.
    Winner(u32),
    /// Lowest score was shared; one of the tied players had strictly fewer
    /// board cards.
    TiebreakWinner(u32),
    /// Lowest score and board size both tied; no winner among these ids.
    Tie(Vec<u32>),
}

/// A scored player, input to [`declare_winner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub id: u32,
    pub score: u32,
    pub board_size: usize,
}

/// Determines which colours `target` holds the majority in.
///
/// With exactly two players a colour needs a two-card lead; with three or
/// more a rival disqualifies the colour only by strictly exceeding the
/// target's count, so true ties leave the majority with both players.
pub fn majority_colours(players: &[Player], target: usize) -> HashSet<Colour> {
    let target_counts = players[target].colour_counts();
    let two_player = players.len() == 2;

    let mut majority = HashSet::new();
    for (&colour, &target_count) in &target_counts {
        let beaten = players.iter().enumerate().any(|(index, rival)| {
            if index == target {
                return false;
            }
            let rival_count = rival.colour_counts().get(&colour).copied().unwrap_or(0);
            if two_player {
                rival_count + 2 > target_count
            } else {
                rival_count > target_count
            }
        });
        if !beaten {
            majority.insert(colour);
        }
    }
    majority
}

/// Scores one board: majority-colour cards count 1, the rest count face value.
pub fn score_board(board: &[Card], majority: &HashSet<Colour>) -> u32 {
    board
        .iter()
        .map(|card| {
            if majority.contains(&card.colour) {
                1
            } else {
                u32::from(card.number)
            }
        })
        .sum()
}

/// Picks the winner: lowest score, ties broken by fewer board cards, and a
/// residual tie reported as-is.
pub fn declare_winner(standings: &[Standing]) -> GameOutcome {
    let lowest = standings
        .iter()
        .map(|s| s.score)
        .min()
        .expect("at least one standing");
    let tied: Vec<&Standing> = standings.iter().filter(|s| s.score == lowest).collect();

    if tied.len() == 1 {
        return GameOutcome::Winner(tied[0].id);
    }

    let fewest = tied.iter().map(|s| s.board_size).min().expect("nonempty");
    let finalists: Vec<u32> = tied
        .iter()
        .filter(|s| s.board_size == fewest)
        .map(|s| s.id)
        .collect();

    if finalists.len() == 1 {
        GameOutcome::TiebreakWinner(finalists[0])
    } else {
        GameOutcome::Tie(finalists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_with_board(id: u32, cards: &[(u8, Colour)]) -> Player {
        let mut player = Player::new(id, format!("p{}", id));
        player.add_to_board(cards.iter().map(|&(n, c)| Card::new(n, c)));
        player
    }

    #[test]
    fn test_two_player_needs_two_card_lead() {
        let a = player_with_board(0, &[(0, Colour::Red); 5]);
        let b = player_with_board(1, &[(0, Colour::Red); 4]);
        let players = vec![a, b];

        // A one-card lead is not enough in a two-player game
        assert!(!majority_colours(&players, 0).contains(&Colour::Red));
        assert!(!majority_colours(&players, 1).contains(&Colour::Red));
    }

    #[test]
    fn test_two_player_with_two_card_lead() {
        let a = player_with_board(0, &[(0, Colour::Red); 5]);
        let b = player_with_board(1, &[(0, Colour::Red); 3]);
        let players = vec![a, b];

        assert!(majority_colours(&players, 0).contains(&Colour::Red));
        assert!(!majority_colours(&players, 1).contains(&Colour::Red));
    }

    #[test]
    fn test_multiplayer_tie_grants_majority_to_both() {
        let a = player_with_board(0, &[(0, Colour::Blue); 3]);
        let b = player_with_board(1, &[(0, Colour::Blue); 2]);
        let c = player_with_board(2, &[(0, Colour::Blue); 3]);
        let players = vec![a, b, c];

        // Nobody strictly exceeds 3, so both A and C hold blue
        assert!(majority_colours(&players, 0).contains(&Colour::Blue));
        assert!(!majority_colours(&players, 1).contains(&Colour::Blue));
        assert!(majority_colours(&players, 2).contains(&Colour::Blue));
    }

    #[test]
    fn test_multiplayer_strict_lead_disqualifies() {
        let a = player_with_board(0, &[(0, Colour::Green); 2]);
        let b = player_with_board(1, &[(0, Colour::Green); 3]);
        let c = player_with_board(2, &[]);
        let players = vec![a, b, c];

        assert!(!majority_colours(&players, 0).contains(&Colour::Green));
        assert!(majority_colours(&players, 1).contains(&Colour::Green));
    }

    #[test]
    fn test_majority_only_over_held_colours() {
        let a = player_with_board(0, &[(0, Colour::Red); 2]);
        let b = player_with_board(1, &[(0, Colour::Blue); 2]);
        let c = player_with_board(2, &[]);
        let players = vec![a, b, c];

        let majority = majority_colours(&players, 2);
        assert!(majority.is_empty());
    }

    #[test]
    fn test_score_board() {
        let board = vec![Card::new(2, Colour::Red), Card::new(5, Colour::Blue)];
        let majority: HashSet<Colour> = [Colour::Red].into_iter().collect();

        assert_eq!(score_board(&board, &majority), 1 + 5);
    }

    #[test]
    fn test_score_empty_board() {
        assert_eq!(score_board(&[], &HashSet::new()), 0);
    }

    #[test]
    fn test_declare_single_winner() {
        let standings = [
            Standing { id: 1, score: 10, board_size: 6 },
            Standing { id: 2, score: 12, board_size: 4 },
        ];
        assert_eq!(declare_winner(&standings), GameOutcome::Winner(1));
    }

    #[test]
    fn test_declare_winner_by_fewer_cards() {
        let standings = [
            Standing { id: 1, score: 10, board_size: 6 },
            Standing { id: 2, score: 10, board_size: 5 },
            Standing { id: 3, score: 15, board_size: 2 },
        ];
        assert_eq!(declare_winner(&standings), GameOutcome::TiebreakWinner(2));
    }

    #[test]
    fn test_declare_unresolved_tie() {
        let standings = [
            Standing { id: 1, score: 10, board_size: 5 },
            Standing { id: 2, score: 10, board_size: 5 },
            Standing { id: 3, score: 10, board_size: 6 },
        ];
        // Player 3 drops out on board size; 1 and 2 remain tied
        assert_eq!(declare_winner(&standings), GameOutcome::Tie(vec![1, 2]));
    }
}
