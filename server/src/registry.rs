//! Server session registry: accept loop, holding pool and lobby dispatch.
//!
//! All registry state is owned by one dispatcher loop. Every receive loop
//! feeds the same inbound channel, so the holding pool and lobby map are
//! only ever touched from this single task; in-game packets are routed to
//! the owning session's channel by lookup instead of re-pointing any queue.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::engine::GameEngine;
use crate::session::{GameSession, SessionEvent};
use shared::player::Player;
use shared::protocol::{ClientPacket, LobbySummary, ServerPacket};
use shared::{MAX_PLAYERS, MIN_PLAYERS};

/// Everything the dispatcher loop can be told.
#[derive(Debug)]
pub enum RegistryEvent {
    /// A socket finished its handshake.
    Connected(Connection),
    /// A packet arrived on some connection's receive loop.
    Packet { player_id: u32, packet: ClientPacket },
    /// A connection's stream ended or failed.
    Disconnected { player_id: u32 },
    /// A game session finished (or aborted) and hands its members back.
    SessionEnded {
        lobby_id: u32,
        members: Vec<Connection>,
    },
    /// Local poison pill for the dispatcher loop.
    #[allow(dead_code)]
    Shutdown,
}

/// A forming game: members in seating order, first member is the owner.
struct Lobby {
    id: u32,
    name: String,
    password: Option<String>,
    max_players: usize,
    owner: u32,
    members: Vec<Connection>,
}

impl Lobby {
    fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    fn summary(&self) -> LobbySummary {
        LobbySummary {
            id: self.id,
            name: self.name.clone(),
            players: self.members.len(),
            max_players: self.max_players,
            private: self.password.is_some(),
        }
    }

    async fn broadcast(&mut self, packet: &ServerPacket) {
        for member in &mut self.members {
            if let Err(e) = member.send(packet).await {
                warn!("send to player {} failed: {}", member.id, e);
            }
        }
    }
}

/// The Parade server: accept loop plus the dispatcher owning all
/// connection and lobby state.
pub struct Server {
    listener: TcpListener,
    events_tx: mpsc::UnboundedSender<RegistryEvent>,
    events_rx: mpsc::UnboundedReceiver<RegistryEvent>,
    /// Connected players not in any lobby or game.
    holding: HashMap<u32, Connection>,
    /// Forming lobbies by id.
    lobbies: HashMap<u32, Lobby>,
    /// Running games by lobby id; packets for their members route here.
    sessions: HashMap<u32, mpsc::UnboundedSender<SessionEvent>>,
    /// Player id -> forming lobby id.
    member_lobby: HashMap<u32, u32>,
    /// Player id -> running session's lobby id.
    in_game: HashMap<u32, u32>,
    next_player_id: u32,
    next_lobby_id: u32,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!("server listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            events_tx,
            events_rx,
            holding: HashMap::new(),
            lobbies: HashMap::new(),
            sessions: HashMap::new(),
            member_lobby: HashMap::new(),
            in_game: HashMap::new(),
            next_player_id: 1,
            next_lobby_id: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and the dispatcher until shutdown.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            debug!("accepted connection from {}", addr);
                            let id = self.next_player_id;
                            self.next_player_id += 1;
                            let events = self.events_tx.clone();
                            tokio::spawn(async move {
                                match Connection::handshake(stream, id, events.clone()).await {
                                    Ok(conn) => {
                                        let _ = events.send(RegistryEvent::Connected(conn));
                                    }
                                    Err(e) => info!("handshake with {} failed: {}", addr, e),
                                }
                            });
                        }
                        Err(e) => error!("accept failed: {}", e),
                    }
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(RegistryEvent::Shutdown) | None => {
                            info!("dispatcher stopping");
                            break;
                        }
                        Some(event) => self.handle_event(event).await,
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::Connected(conn) => {
                info!("player {} ({}) entered the holding pool", conn.id, conn.name);
                self.holding.insert(conn.id, conn);
            }
            RegistryEvent::Packet { player_id, packet } => {
                self.dispatch_packet(player_id, packet).await;
            }
            RegistryEvent::Disconnected { player_id } => {
                self.handle_disconnect(player_id).await;
            }
            RegistryEvent::SessionEnded { lobby_id, members } => {
                info!(
                    "session {} ended, {} players back in the pool",
                    lobby_id,
                    members.len()
                );
                self.sessions.remove(&lobby_id);
                for conn in members {
                    self.in_game.remove(&conn.id);
                    self.holding.insert(conn.id, conn);
                }
            }
            RegistryEvent::Shutdown => {}
        }
    }

    /// Routes one inbound packet: session members go to their session,
    /// everyone else gets the lobby operations. Unknown or unauthorized
    /// senders are logged and ignored, never fatal.
    async fn dispatch_packet(&mut self, player_id: u32, packet: ClientPacket) {
        if let Some(lobby_id) = self.in_game.get(&player_id) {
            if let Some(session) = self.sessions.get(lobby_id) {
                let _ = session.send(SessionEvent::Packet { player_id, packet });
            }
            return;
        }

        match packet {
            ClientPacket::LobbyRequestList => self.send_lobby_list(player_id).await,
            ClientPacket::LobbyCreate {
                name,
                password,
                max_players,
            } => self.create_lobby(player_id, name, password, max_players).await,
            ClientPacket::LobbyJoin { lobby_id, password } => {
                self.join_lobby(player_id, lobby_id, password).await;
            }
            ClientPacket::LobbyLeave { lobby_id } => {
                self.leave_lobby(player_id, lobby_id, false).await;
            }
            ClientPacket::LobbyClose { lobby_id } => self.close_lobby(player_id, lobby_id).await,
            ClientPacket::LobbyStart { lobby_id } => self.start_lobby(player_id, lobby_id).await,
            ClientPacket::Connect { .. } | ClientPacket::CardPlay { .. } | ClientPacket::PoisonPill => {
                warn!("ignoring out-of-place packet from player {}", player_id);
            }
        }
    }

    async fn handle_disconnect(&mut self, player_id: u32) {
        if let Some(mut conn) = self.holding.remove(&player_id) {
            info!("player {} ({}) left", player_id, conn.name);
            conn.close().await;
        } else if let Some(lobby_id) = self.member_lobby.get(&player_id).copied() {
            self.leave_lobby(player_id, lobby_id, true).await;
        } else if let Some(lobby_id) = self.in_game.remove(&player_id) {
            if let Some(session) = self.sessions.get(&lobby_id) {
                let _ = session.send(SessionEvent::Disconnected { player_id });
            }
        } else {
            debug!("disconnect for unknown player {}", player_id);
        }
    }

    async fn send_lobby_list(&mut self, player_id: u32) {
        let Some(conn) = self.holding.get_mut(&player_id) else {
            warn!("lobby list request from player {} outside the pool", player_id);
            return;
        };
        let lobbies: Vec<LobbySummary> = self.lobbies.values().map(Lobby::summary).collect();
        if let Err(e) = conn.send(&ServerPacket::LobbyList { lobbies }).await {
            warn!("send to player {} failed: {}", player_id, e);
        }
    }

    async fn create_lobby(
        &mut self,
        player_id: u32,
        name: String,
        password: Option<String>,
        max_players: usize,
    ) {
        let Some(mut conn) = self.holding.remove(&player_id) else {
            warn!("lobby create from player {} outside the pool", player_id);
            return;
        };

        if name.trim().is_empty() || !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            let ack = ServerPacket::LobbyCreateAck {
                lobby_id: 0,
                success: false,
                message: format!(
                    "a lobby needs a name and {} to {} seats",
                    MIN_PLAYERS, MAX_PLAYERS
                ),
            };
            if let Err(e) = conn.send(&ack).await {
                warn!("send to player {} failed: {}", player_id, e);
            }
            self.holding.insert(player_id, conn);
            return;
        }

        let lobby_id = self.next_lobby_id;
        self.next_lobby_id += 1;

        let ack = ServerPacket::LobbyCreateAck {
            lobby_id,
            success: true,
            message: format!("lobby '{}' created", name),
        };
        if let Err(e) = conn.send(&ack).await {
            warn!("send to player {} failed: {}", player_id, e);
        }

        info!(
            "player {} created lobby {} ('{}', {} seats{})",
            player_id,
            lobby_id,
            name,
            max_players,
            if password.is_some() { ", private" } else { "" }
        );
        self.member_lobby.insert(player_id, lobby_id);
        self.lobbies.insert(
            lobby_id,
            Lobby {
                id: lobby_id,
                name,
                password,
                max_players,
                owner: player_id,
                members: vec![conn],
            },
        );
    }

    async fn join_lobby(&mut self, player_id: u32, lobby_id: u32, password: Option<String>) {
        let Some(mut conn) = self.holding.remove(&player_id) else {
            warn!("lobby join from player {} outside the pool", player_id);
            return;
        };

        let refusal = match self.lobbies.get(&lobby_id) {
            None => Some("no such lobby"),
            Some(lobby) if lobby.is_full() => Some("lobby is full"),
            Some(lobby) if lobby.password.is_some() && lobby.password != password => {
                Some("wrong password")
            }
            Some(_) => None,
        };

        if let Some(reason) = refusal {
            let ack = ServerPacket::LobbyJoinAck {
                lobby_id,
                success: false,
                message: reason.to_string(),
            };
            if let Err(e) = conn.send(&ack).await {
                warn!("send to player {} failed: {}", player_id, e);
            }
            self.holding.insert(player_id, conn);
            return;
        }

        if let Some(lobby) = self.lobbies.get_mut(&lobby_id) {
            lobby
                .broadcast(&ServerPacket::LobbyPlayerJoined {
                    lobby_id,
                    player: conn.public(),
                })
                .await;

            let ack = ServerPacket::LobbyJoinAck {
                lobby_id,
                success: true,
                message: format!("joined '{}'", lobby.name),
            };
            if let Err(e) = conn.send(&ack).await {
                warn!("send to player {} failed: {}", player_id, e);
            }

            info!("player {} joined lobby {}", player_id, lobby_id);
            self.member_lobby.insert(player_id, lobby_id);
            lobby.members.push(conn);
        }
    }

    /// Removes a member from a forming lobby. `disconnected` members are
    /// closed and dropped instead of returning to the pool. An owner
    /// leaving closes the whole lobby.
    async fn leave_lobby(&mut self, player_id: u32, lobby_id: u32, disconnected: bool) {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            warn!("player {} tried to leave unknown lobby {}", player_id, lobby_id);
            return;
        };
        let Some(position) = lobby.members.iter().position(|m| m.id == player_id) else {
            warn!("player {} is not in lobby {}", player_id, lobby_id);
            return;
        };

        let mut conn = lobby.members.remove(position);
        self.member_lobby.remove(&player_id);
        let was_owner = lobby.owner == player_id;

        lobby
            .broadcast(&ServerPacket::LobbyPlayerLeft {
                lobby_id,
                player: conn.public(),
            })
            .await;

        info!("player {} left lobby {}", player_id, lobby_id);
        if disconnected {
            conn.close().await;
        } else {
            self.holding.insert(player_id, conn);
        }

        if was_owner {
            self.disband_lobby(lobby_id, "the owner left").await;
        } else if self.lobbies.get(&lobby_id).map_or(false, |l| l.members.is_empty()) {
            self.disband_lobby(lobby_id, "lobby empty").await;
        }
    }

    async fn close_lobby(&mut self, player_id: u32, lobby_id: u32) {
        match self.lobbies.get(&lobby_id) {
            None => {
                warn!("player {} tried to close unknown lobby {}", player_id, lobby_id);
            }
            Some(lobby) if lobby.owner != player_id => {
                warn!(
                    "player {} tried to close lobby {} they do not own",
                    player_id, lobby_id
                );
            }
            Some(_) => self.disband_lobby(lobby_id, "closed by owner").await,
        }
    }

    /// Notifies every member, returns them to the pool and drops the lobby.
    async fn disband_lobby(&mut self, lobby_id: u32, reason: &str) {
        let Some(mut lobby) = self.lobbies.remove(&lobby_id) else {
            return;
        };
        lobby
            .broadcast(&ServerPacket::LobbyClosed {
                lobby_id,
                reason: reason.to_string(),
            })
            .await;
        info!("lobby {} disbanded: {}", lobby_id, reason);
        for conn in lobby.members {
            self.member_lobby.remove(&conn.id);
            self.holding.insert(conn.id, conn);
        }
    }

    /// Starts a lobby's game: builds the engine, hands the members to a
    /// fresh session task and registers its routing channel.
    async fn start_lobby(&mut self, player_id: u32, lobby_id: u32) {
        let Some(mut lobby) = self.lobbies.remove(&lobby_id) else {
            warn!("player {} tried to start unknown lobby {}", player_id, lobby_id);
            return;
        };
        if lobby.owner != player_id {
            warn!(
                "player {} tried to start lobby {} they do not own",
                player_id, lobby_id
            );
            self.lobbies.insert(lobby_id, lobby);
            return;
        }

        let players: Vec<Player> = lobby
            .members
            .iter()
            .map(|m| Player::new(m.id, m.name.clone()))
            .collect();

        let engine = match GameEngine::new(players) {
            Ok(engine) => engine,
            Err(e) => {
                // The start attempt dies, the lobby itself survives
                let ack = ServerPacket::LobbyStartAck {
                    lobby_id,
                    success: false,
                    message: e.to_string(),
                };
                if let Some(owner) = lobby.members.iter_mut().find(|m| m.id == player_id) {
                    if let Err(e) = owner.send(&ack).await {
                        warn!("send to player {} failed: {}", player_id, e);
                    }
                }
                warn!("lobby {} failed to start: {}", lobby_id, e);
                self.lobbies.insert(lobby_id, lobby);
                return;
            }
        };

        let ack = ServerPacket::LobbyStartAck {
            lobby_id,
            success: true,
            message: "game starting".to_string(),
        };
        if let Some(owner) = lobby.members.iter_mut().find(|m| m.id == player_id) {
            if let Err(e) = owner.send(&ack).await {
                warn!("send to player {} failed: {}", player_id, e);
            }
        }

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        for member in &lobby.members {
            self.member_lobby.remove(&member.id);
            self.in_game.insert(member.id, lobby_id);
        }
        self.sessions.insert(lobby_id, session_tx);

        info!(
            "lobby {} ('{}') starting with {} players",
            lobby_id,
            lobby.name,
            lobby.members.len()
        );
        let session = GameSession::new(
            lobby_id,
            lobby.name,
            lobby.members,
            engine,
            session_rx,
            self.events_tx.clone(),
        );
        tokio::spawn(session.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_lobby(max_players: usize, password: Option<&str>) -> Lobby {
        Lobby {
            id: 4,
            name: "table".to_string(),
            password: password.map(str::to_string),
            max_players,
            owner: 1,
            members: Vec::new(),
        }
    }

    #[test]
    fn test_lobby_summary() {
        let lobby = empty_lobby(4, Some("pw"));
        let summary = lobby.summary();
        assert_eq!(summary.id, 4);
        assert_eq!(summary.name, "table");
        assert_eq!(summary.players, 0);
        assert_eq!(summary.max_players, 4);
        assert!(summary.private);
    }

    #[test]
    fn test_lobby_full_check() {
        let lobby = empty_lobby(0, None);
        assert!(lobby.is_full());

        let lobby = empty_lobby(2, None);
        assert!(!lobby.is_full());
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let server = Server::new(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
