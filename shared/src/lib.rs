//! Types and rules shared between the Parade server and client.
//!
//! The `cards` module holds the deck and parade primitives, `player` the
//! per-player state, `score` the end-of-game tabulation, and `protocol`
//! the wire packet definitions plus the length-framed codec both sides
//! speak over TCP.

pub mod cards;
pub mod player;
pub mod protocol;
pub mod score;

/// Highest card number; cards run 0..=MAX_CARD_NUMBER in each colour.
pub const MAX_CARD_NUMBER: u8 = 10;
/// Full deck size: 11 numbers x 6 colours.
pub const DECK_SIZE: usize = 66;
/// Cards laid out from the deck to open the parade.
pub const INITIAL_PARADE_SIZE: usize = 6;
/// Cards dealt to each player before the first turn.
pub const INITIAL_HAND_SIZE: usize = 5;
/// Cards each player discards before scoring.
pub const DISCARD_COUNT: usize = 2;
/// Smallest lobby that may start a game.
pub const MIN_PLAYERS: usize = 2;
/// Largest lobby the server will create.
pub const MAX_PLAYERS: usize = 6;
/// Seconds a fresh connection gets to complete the name handshake.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;
