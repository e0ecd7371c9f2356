//! Turn-based game engine state machine.
//!
//! The engine is synchronous and owns all card state for one game: the
//! deck, the parade and the seated players. The session task drives it by
//! soliciting one action at a time, so no two actions are ever processed
//! concurrently and turn order is enforced by construction.

use log::{debug, info};
use rand::Rng;
use thiserror::Error;

use shared::cards::{Card, Deck, DeckError, Parade};
use shared::player::{Player, PlayerPublic};
use shared::score::{declare_winner, majority_colours, score_board, GameOutcome, Standing};
use shared::{INITIAL_HAND_SIZE, MIN_PLAYERS};

/// Phases of one game, in order of traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Lobby,
    Dealing,
    MainLoop,
    FinalRound,
    Discard,
    Scoring,
    Ended,
}

/// Typed failures surfaced to the session driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot start a game with {count} players; need at least 2")]
    InsufficientPlayers { count: usize },
    #[error("player {player} does not hold {card}")]
    CardNotInHand { player: u32, card: Card },
    #[error("{operation} is not valid during {phase:?}")]
    WrongPhase {
        operation: &'static str,
        phase: GamePhase,
    },
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// What one play did: the cards it captured and the replacement draw, if
/// the phase grants one.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub captured: Vec<Card>,
    pub drawn: Option<Card>,
}

/// One game's card state and turn machinery.
pub struct GameEngine {
    deck: Deck,
    parade: Parade,
    players: Vec<Player>,
    cursor: usize,
    phase: GamePhase,
    final_turns_left: usize,
}

impl GameEngine {
    /// Creates an engine over a fresh shuffled deck. The parade is laid out
    /// immediately; hands are dealt by [`GameEngine::deal`].
    pub fn new(players: Vec<Player>) -> Result<Self, EngineError> {
        Self::with_deck(players, Deck::new())
    }

    /// Creates an engine over a caller-supplied deck, for deterministic
    /// replays and tests.
    pub fn with_deck(players: Vec<Player>, mut deck: Deck) -> Result<Self, EngineError> {
        if players.len() < MIN_PLAYERS {
            return Err(EngineError::InsufficientPlayers {
                count: players.len(),
            });
        }
        let parade = Parade::from_deck(&mut deck)?;
        Ok(Self {
            deck,
            parade,
            players,
            cursor: 0,
            phase: GamePhase::Lobby,
            final_turns_left: 0,
        })
    }

    /// Deals opening hands and rolls the starting player.
    ///
    /// The batch is drawn once and distributed round-robin: player `i`
    /// receives batch indices `i + player_count * j`, preserving the
    /// one-card-at-a-time deal order. Two dice pick who opens.
    pub fn deal(&mut self) -> Result<(), EngineError> {
        if self.phase != GamePhase::Lobby {
            return Err(EngineError::WrongPhase {
                operation: "deal",
                phase: self.phase,
            });
        }
        self.phase = GamePhase::Dealing;

        let count = self.players.len();
        let batch = self.deck.draw(INITIAL_HAND_SIZE * count)?;
        for (index, player) in self.players.iter_mut().enumerate() {
            for round in 0..INITIAL_HAND_SIZE {
                player.add_to_hand(batch[index + count * round]);
            }
        }

        let mut rng = rand::thread_rng();
        let roll = rng.gen_range(1..=6) + rng.gen_range(1..=6);
        self.cursor = roll % count;
        info!(
            "dealt {} cards each to {} players, rolled {} -> {} opens",
            INITIAL_HAND_SIZE, count, roll, self.players[self.cursor].name
        );

        self.phase = GamePhase::MainLoop;
        Ok(())
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn parade(&self) -> &[Card] {
        self.parade.cards()
    }

    pub fn deck_size(&self) -> usize {
        self.deck.len()
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_player(&self) -> &Player {
        &self.players[self.cursor]
    }

    /// Plays `card` from the current player's hand into the parade.
    ///
    /// Captured cards go to the player's board. During the main loop the
    /// player draws a replacement unless the deck already ran dry; final
    /// round plays never draw.
    pub fn play_card(&mut self, card: Card) -> Result<TurnOutcome, EngineError> {
        if self.phase != GamePhase::MainLoop && self.phase != GamePhase::FinalRound {
            return Err(EngineError::WrongPhase {
                operation: "play_card",
                phase: self.phase,
            });
        }

        let player = &mut self.players[self.cursor];
        let card = player
            .take_from_hand(card)
            .ok_or(EngineError::CardNotInHand {
                player: player.id,
                card,
            })?;

        let captured = self.parade.place_card(card);
        let player = &mut self.players[self.cursor];
        player.add_to_board(captured.iter().copied());

        let drawn = if self.phase == GamePhase::MainLoop && !self.deck.is_empty() {
            let card = self.deck.draw(1)?[0];
            self.players[self.cursor].add_to_hand(card);
            Some(card)
        } else {
            None
        };

        debug!(
            "player {} played {}, captured {}, drew {:?}",
            self.players[self.cursor].id,
            card,
            captured.len(),
            drawn
        );
        Ok(TurnOutcome { captured, drawn })
    }

    /// Closes the current turn: checks the end trigger, counts down the
    /// final round and advances the cursor.
    ///
    /// The main loop stops once the deck is empty or any board holds all
    /// six colours; every player then gets exactly one more play.
    pub fn end_turn(&mut self) {
        match self.phase {
            GamePhase::MainLoop => {
                let all_colours = self.players.iter().any(Player::has_all_colours);
                if self.deck.is_empty() || all_colours {
                    info!(
                        "final round triggered ({})",
                        if all_colours { "six colours" } else { "deck empty" }
                    );
                    self.phase = GamePhase::FinalRound;
                    self.final_turns_left = self.players.len();
                }
            }
            GamePhase::FinalRound => {
                self.final_turns_left -= 1;
                if self.final_turns_left == 0 {
                    self.phase = GamePhase::Discard;
                }
            }
            _ => {}
        }
        self.cursor = (self.cursor + 1) % self.players.len();
    }

    /// Removes one discard selection from a player's hand. Discarded cards
    /// leave the game entirely.
    pub fn discard(&mut self, player_index: usize, card: Card) -> Result<(), EngineError> {
        if self.phase != GamePhase::Discard {
            return Err(EngineError::WrongPhase {
                operation: "discard",
                phase: self.phase,
            });
        }
        let player = &mut self.players[player_index];
        player
            .take_from_hand(card)
            .ok_or(EngineError::CardNotInHand {
                player: player.id,
                card,
            })?;
        Ok(())
    }

    /// Runs the scoring phase: merges remaining hands onto boards, counts
    /// majorities and points, and declares the outcome.
    pub fn score(&mut self) -> Result<(GameOutcome, Vec<(PlayerPublic, u32)>), EngineError> {
        if self.phase != GamePhase::Discard {
            return Err(EngineError::WrongPhase {
                operation: "score",
                phase: self.phase,
            });
        }
        self.phase = GamePhase::Scoring;

        for player in &mut self.players {
            player.move_hand_to_board();
        }

        let mut scores = Vec::with_capacity(self.players.len());
        let mut standings = Vec::with_capacity(self.players.len());
        for index in 0..self.players.len() {
            let majority = majority_colours(&self.players, index);
            let player = &self.players[index];
            let score = score_board(player.board(), &majority);
            info!("player {} ({}) scored {}", player.id, player.name, score);
            standings.push(Standing {
                id: player.id,
                score,
                board_size: player.board().len(),
            });
            scores.push((player.public(), score));
        }

        let outcome = declare_winner(&standings);
        self.phase = GamePhase::Ended;
        Ok((outcome, scores))
    }
}
