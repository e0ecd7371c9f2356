//! Per-player game state: identity, hand and scoring board.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cards::{Card, Colour};

/// A player's identity and public board, as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPublic {
    pub id: u32,
    pub name: String,
    pub board: Vec<Card>,
}

/// Full per-player state held by the game engine.
///
/// The hand is ordered and only changes through explicit add/remove calls;
/// the board is append-only during play and consumed at scoring.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    hand: Vec<Card>,
    board: Vec<Card>,
}

impl Player {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hand: Vec::new(),
            board: Vec::new(),
        }
    }

    pub fn add_to_hand(&mut self, card: Card) {
        self.hand.push(card);
    }

    /// Removes the first card in hand equal to `card`, if any.
    pub fn take_from_hand(&mut self, card: Card) -> Option<Card> {
        let position = self.hand.iter().position(|&c| c == card)?;
        Some(self.hand.remove(position))
    }

    pub fn add_to_board(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.board.extend(cards);
    }

    /// Moves every remaining hand card onto the board (the pre-scoring merge).
    pub fn move_hand_to_board(&mut self) {
        let hand = std::mem::take(&mut self.hand);
        self.board.extend(hand);
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn board(&self) -> &[Card] {
        &self.board
    }

    /// Board card count per colour; colours with no cards are absent.
    pub fn colour_counts(&self) -> HashMap<Colour, usize> {
        let mut counts = HashMap::new();
        for card in &self.board {
            *counts.entry(card.colour).or_insert(0) += 1;
        }
        counts
    }

    /// True once the board holds at least one card of every colour, which
    /// triggers the final round.
    pub fn has_all_colours(&self) -> bool {
        self.colour_counts().len() == Colour::ALL.len()
    }

    pub fn public(&self) -> PlayerPublic {
        PlayerPublic {
            id: self.id,
            name: self.name.clone(),
            board: self.board.clone(),
        }
    }
}
