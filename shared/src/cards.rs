//! Card, deck and parade primitives.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{INITIAL_PARADE_SIZE, MAX_CARD_NUMBER};

/// The six card colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Colour {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Black,
}

impl Colour {
    /// Every colour, in a fixed order used for deck construction.
    pub const ALL: [Colour; 6] = [
        Colour::Red,
        Colour::Blue,
        Colour::Green,
        Colour::Yellow,
        Colour::Purple,
        Colour::Black,
    ];
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Colour::Red => "Red",
            Colour::Blue => "Blue",
            Colour::Green => "Green",
            Colour::Yellow => "Yellow",
            Colour::Purple => "Purple",
            Colour::Black => "Black",
        };
        write!(f, "{}", name)
    }
}

/// A single card. Two cards with the same number and colour are equal;
/// cards carry no identity of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub number: u8,
    pub colour: Colour,
}

impl Card {
    pub fn new(number: u8, colour: Colour) -> Self {
        Self { number, colour }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.colour, self.number)
    }
}

/// Errors raised by deck operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeckError {
    #[error("requested {requested} cards but only {remaining} remain")]
    Insufficient { requested: usize, remaining: usize },
}

/// The shuffled draw pile. Built once as the full cartesian product of
/// numbers and colours; only ever shrinks via [`Deck::draw`].
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Builds the full 66-card deck and shuffles it.
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity((MAX_CARD_NUMBER as usize + 1) * Colour::ALL.len());
        for number in 0..=MAX_CARD_NUMBER {
            for colour in Colour::ALL {
                cards.push(Card::new(number, colour));
            }
        }
        cards.shuffle(&mut rand::thread_rng());
        Self { cards }
    }

    /// Builds a deck with a fixed order. Draws come from the back, so the
    /// last card of `cards` is drawn first.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Removes and returns the last `n` cards of the pile.
    ///
    /// Callers are expected to check [`Deck::len`] first; asking for more
    /// cards than remain is an error, never a silent clamp.
    pub fn draw(&mut self, n: usize) -> Result<Vec<Card>, DeckError> {
        if n > self.cards.len() {
            return Err(DeckError::Insufficient {
                requested: n,
                remaining: self.cards.len(),
            });
        }
        Ok(self.cards.split_off(self.cards.len() - n))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared line of face-up cards players play into and capture from.
#[derive(Debug, Clone)]
pub struct Parade {
    cards: Vec<Card>,
}

impl Parade {
    /// Opens the parade with the first six cards off the deck.
    pub fn from_deck(deck: &mut Deck) -> Result<Self, DeckError> {
        let cards = deck.draw(INITIAL_PARADE_SIZE)?;
        Ok(Self { cards })
    }

    #[cfg(test)]
    fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Plays `card` into the parade and returns the cards it captures.
    ///
    /// The first `len - card.number` cards (the oldest-laid end) are in the
    /// removal zone; a card there is captured when its number is at most the
    /// played number or its colour matches. Captured cards leave the parade
    /// and the played card joins the end. A played number at or above the
    /// current length captures nothing and the parade simply grows.
    pub fn place_card(&mut self, card: Card) -> Vec<Card> {
        let remove_zone = self.cards.len().saturating_sub(card.number as usize);
        let mut captured = Vec::new();
        let mut kept = Vec::with_capacity(self.cards.len() + 1);

        for (position, parade_card) in self.cards.drain(..).enumerate() {
            let in_zone = position < remove_zone;
            if in_zone && (parade_card.number <= card.number || parade_card.colour == card.colour) {
                captured.push(parade_card);
            } else {
                kept.push(parade_card);
            }
        }

        kept.push(card);
        self.cards = kept;
        captured
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_deck_completeness() {
        let mut deck = Deck::new();
        assert_eq!(deck.len(), crate::DECK_SIZE);

        let drawn = deck.draw(crate::DECK_SIZE).unwrap();
        let unique: HashSet<Card> = drawn.iter().copied().collect();
        assert_eq!(unique.len(), crate::DECK_SIZE);

        for number in 0..=MAX_CARD_NUMBER {
            for colour in Colour::ALL {
                assert!(unique.contains(&Card::new(number, colour)));
            }
        }
        assert!(deck.is_empty());
    }

    #[test]
    fn test_deck_draw_from_back() {
        let mut deck = Deck::from_cards(vec![
            Card::new(1, Colour::Red),
            Card::new(2, Colour::Blue),
            Card::new(3, Colour::Green),
        ]);

        let drawn = deck.draw(2).unwrap();
        assert_eq!(
            drawn,
            vec![Card::new(2, Colour::Blue), Card::new(3, Colour::Green)]
        );
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn test_deck_draw_insufficient() {
        let mut deck = Deck::from_cards(vec![Card::new(0, Colour::Red)]);

        let result = deck.draw(2);
        assert_eq!(
            result,
            Err(DeckError::Insufficient {
                requested: 2,
                remaining: 1,
            })
        );
        // A failed draw leaves the pile untouched
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn test_parade_opens_with_six() {
        let mut deck = Deck::new();
        let parade = Parade::from_deck(&mut deck).unwrap();
        assert_eq!(parade.len(), INITIAL_PARADE_SIZE);
        assert_eq!(deck.len(), crate::DECK_SIZE - INITIAL_PARADE_SIZE);
    }

    #[test]
    fn test_place_card_captures_removal_zone() {
        // Six zero cards of distinct colours; playing Red 3 scans the first
        // three and captures all of them on number.
        let parade_cards: Vec<Card> = Colour::ALL.iter().map(|&c| Card::new(0, c)).collect();
        let mut parade = Parade::from_cards(parade_cards);

        let captured = parade.place_card(Card::new(3, Colour::Red));

        assert_eq!(
            captured,
            vec![
                Card::new(0, Colour::Red),
                Card::new(0, Colour::Blue),
                Card::new(0, Colour::Green),
            ]
        );
        assert_eq!(
            parade.cards(),
            &[
                Card::new(0, Colour::Yellow),
                Card::new(0, Colour::Purple),
                Card::new(0, Colour::Black),
                Card::new(3, Colour::Red),
            ]
        );
    }

    #[test]
    fn test_place_card_colour_match_in_zone() {
        let mut parade = Parade::from_cards(vec![
            Card::new(9, Colour::Red),
            Card::new(9, Colour::Blue),
            Card::new(1, Colour::Green),
            Card::new(8, Colour::Yellow),
            Card::new(8, Colour::Purple),
            Card::new(8, Colour::Black),
        ]);

        // Remove zone is 6 - 2 = 4: high numbers survive unless the colour
        // matches, low numbers are captured regardless.
        let captured = parade.place_card(Card::new(2, Colour::Blue));

        assert_eq!(
            captured,
            vec![Card::new(9, Colour::Blue), Card::new(1, Colour::Green)]
        );
        assert_eq!(parade.len(), 5);
        assert_eq!(parade.cards()[4], Card::new(2, Colour::Blue));
    }

    #[test]
    fn test_place_card_high_number_captures_nothing() {
        let parade_cards: Vec<Card> = Colour::ALL.iter().map(|&c| Card::new(0, c)).collect();
        let mut parade = Parade::from_cards(parade_cards);

        let captured = parade.place_card(Card::new(9, Colour::Red));

        assert!(captured.is_empty());
        assert_eq!(parade.len(), 7);
    }

    #[test]
    fn test_place_card_zone_shrinks_with_parade() {
        // Rule applies identically at any length: parade of 2, playing a 1
        // scans only the oldest card.
        let mut parade = Parade::from_cards(vec![
            Card::new(0, Colour::Red),
            Card::new(0, Colour::Blue),
        ]);

        let captured = parade.place_card(Card::new(1, Colour::Green));

        assert_eq!(captured, vec![Card::new(0, Colour::Red)]);
        assert_eq!(
            parade.cards(),
            &[Card::new(0, Colour::Blue), Card::new(1, Colour::Green)]
        );
    }

    #[test]
    fn test_card_display() {
        let card = Card::new(7, Colour::Purple);
        assert_eq!(card.to_string(), "[Purple 7]");
    }
}
