//! One running game: the async driver around the engine.
//!
//! A session owns its members' connections and its own inbound channel; the
//! registry routes every packet from a seated player here. The session
//! solicits exactly one action at a time, so the engine never sees
//! concurrent plays. Any protocol failure or disconnect aborts the game —
//! a half-played game is not resumable — and the surviving connections go
//! back to the registry's holding pool.

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::connection::Connection;
use crate::engine::{EngineError, GameEngine, GamePhase};
use crate::registry::RegistryEvent;
use shared::cards::Card;
use shared::protocol::{ClientPacket, ServerPacket};
use shared::DISCARD_COUNT;

/// Packets and peer-loss notices routed to this session by the registry.
#[derive(Debug)]
pub enum SessionEvent {
    Packet { player_id: u32, packet: ClientPacket },
    Disconnected { player_id: u32 },
}

/// Why a game attempt was abandoned.
enum SessionAbort {
    PlayerLost(u32),
    Engine(EngineError),
    ChannelClosed,
}

pub struct GameSession {
    lobby_id: u32,
    lobby_name: String,
    /// Seating order; index-aligned with the engine's player list.
    members: Vec<Connection>,
    engine: GameEngine,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    registry: mpsc::UnboundedSender<RegistryEvent>,
}

impl GameSession {
    pub fn new(
        lobby_id: u32,
        lobby_name: String,
        members: Vec<Connection>,
        engine: GameEngine,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        registry: mpsc::UnboundedSender<RegistryEvent>,
    ) -> Self {
        Self {
            lobby_id,
            lobby_name,
            members,
            engine,
            events,
            registry,
        }
    }

    /// Plays the game to completion (or abort), then returns the members
    /// to the registry.
    pub async fn run(mut self) {
        info!(
            "session {} ('{}') running with {} players",
            self.lobby_id,
            self.lobby_name,
            self.members.len()
        );

        match self.play().await {
            Ok(()) => info!("session {} finished", self.lobby_id),
            Err(SessionAbort::PlayerLost(player_id)) => {
                warn!(
                    "session {} abandoned: player {} disconnected",
                    self.lobby_id, player_id
                );
                if let Some(position) = self.members.iter().position(|m| m.id == player_id) {
                    let mut lost = self.members.remove(position);
                    lost.close().await;
                }
                self.broadcast(&ServerPacket::LobbyClosed {
                    lobby_id: self.lobby_id,
                    reason: "a player disconnected; the game was abandoned".to_string(),
                })
                .await;
            }
            Err(SessionAbort::Engine(e)) => {
                error!("session {} aborted on engine error: {}", self.lobby_id, e);
                self.broadcast(&ServerPacket::LobbyClosed {
                    lobby_id: self.lobby_id,
                    reason: "the game was aborted".to_string(),
                })
                .await;
            }
            Err(SessionAbort::ChannelClosed) => {
                warn!("session {}: registry went away", self.lobby_id);
            }
        }

        let members = std::mem::take(&mut self.members);
        let _ = self.registry.send(RegistryEvent::SessionEnded {
            lobby_id: self.lobby_id,
            members,
        });
    }

    async fn play(&mut self) -> Result<(), SessionAbort> {
        self.engine.deal().map_err(SessionAbort::Engine)?;
        for index in 0..self.members.len() {
            let cards = self.engine.players()[index].hand().to_vec();
            self.send_to(index, &ServerPacket::GameStart { cards }).await;
        }

        while self.engine.phase() == GamePhase::MainLoop {
            self.run_turn().await?;
            if self.engine.phase() == GamePhase::FinalRound {
                self.broadcast(&ServerPacket::GameFinalRound).await;
            }
        }

        while self.engine.phase() == GamePhase::FinalRound {
            self.run_turn().await?;
        }

        self.run_discards().await?;

        let (outcome, scores) = self.engine.score().map_err(SessionAbort::Engine)?;
        self.broadcast(&ServerPacket::GameEnd { outcome, scores }).await;
        Ok(())
    }

    /// Prompts the current player, applies their play and closes the turn.
    /// A play naming a card outside the hand is rejected and re-prompted.
    async fn run_turn(&mut self) -> Result<(), SessionAbort> {
        let current = self.engine.current_index();
        loop {
            let prompt = ServerPacket::PlayerTurn {
                players: self.engine.players().iter().map(|p| p.public()).collect(),
                current: self.engine.current_player().id,
                parade: self.engine.parade().to_vec(),
                deck_size: self.engine.deck_size(),
                hand_size: self.engine.current_player().hand().len(),
            };
            self.broadcast(&prompt).await;

            let card = self.await_card(current).await?;
            match self.engine.play_card(card) {
                Ok(outcome) => {
                    if !outcome.captured.is_empty() {
                        let notice = ServerPacket::PlayerReceivedParadeCards {
                            player_id: self.members[current].id,
                            cards: outcome.captured,
                        };
                        self.broadcast(&notice).await;
                    }
                    if let Some(card) = outcome.drawn {
                        let drawn = ServerPacket::PlayerDrawnCard {
                            card,
                            deck_size: self.engine.deck_size(),
                        };
                        self.send_to(current, &drawn).await;
                    }
                    self.engine.end_turn();
                    return Ok(());
                }
                Err(EngineError::CardNotInHand { player, card }) => {
                    warn!(
                        "session {}: player {} played {} they do not hold, re-prompting",
                        self.lobby_id, player, card
                    );
                }
                Err(e) => return Err(SessionAbort::Engine(e)),
            }
        }
    }

    /// Collects each player's two discards in seating order.
    async fn run_discards(&mut self) -> Result<(), SessionAbort> {
        for index in 0..self.members.len() {
            let mut taken = 0;
            while taken < DISCARD_COUNT {
                self.send_to(index, &ServerPacket::GameDiscard).await;
                let card = self.await_card(index).await?;
                match self.engine.discard(index, card) {
                    Ok(()) => taken += 1,
                    Err(EngineError::CardNotInHand { player, card }) => {
                        warn!(
                            "session {}: player {} discarded {} they do not hold, re-prompting",
                            self.lobby_id, player, card
                        );
                    }
                    Err(e) => return Err(SessionAbort::Engine(e)),
                }
            }
        }
        Ok(())
    }

    /// Waits for a card selection from one seat. Anything from another
    /// seat, or any non-play packet, is logged and dropped; a disconnect
    /// of any member aborts the game.
    async fn await_card(&mut self, seat: usize) -> Result<Card, SessionAbort> {
        let expected = self.members[seat].id;
        loop {
            match self.events.recv().await {
                None => return Err(SessionAbort::ChannelClosed),
                Some(SessionEvent::Disconnected { player_id }) => {
                    return Err(SessionAbort::PlayerLost(player_id));
                }
                Some(SessionEvent::Packet { player_id, packet }) => {
                    if player_id != expected {
                        debug!(
                            "session {}: out-of-turn packet from player {}",
                            self.lobby_id, player_id
                        );
                        continue;
                    }
                    match packet {
                        ClientPacket::CardPlay { card } => return Ok(card),
                        other => {
                            debug!(
                                "session {}: ignoring {:?} from player {}",
                                self.lobby_id, other, player_id
                            );
                        }
                    }
                }
            }
        }
    }

    async fn send_to(&mut self, seat: usize, packet: &ServerPacket) {
        let member = &mut self.members[seat];
        if let Err(e) = member.send(packet).await {
            warn!(
                "session {}: send to player {} failed: {}",
                self.lobby_id, member.id, e
            );
        }
    }

    async fn broadcast(&mut self, packet: &ServerPacket) {
        for member in &mut self.members {
            if let Err(e) = member.send(packet).await {
                warn!(
                    "session {}: send to player {} failed: {}",
                    self.lobby_id, member.id, e
                );
            }
        }
    }
}
