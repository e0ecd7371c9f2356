//! Client-side connection handling and the interactive packet pump.
//!
//! The socket's read half gets its own listener task so a console command
//! can never interrupt a frame mid-read; packets reach the command loop
//! through a channel, which is safe to race against stdin.

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::console;
use shared::cards::Card;
use shared::protocol::{self, ClientPacket, ServerPacket};
use shared::{MAX_PLAYERS, MIN_PLAYERS};

pub struct Client {
    writer: OwnedWriteHalf,
    packets: mpsc::UnboundedReceiver<ServerPacket>,
    reader_task: JoinHandle<()>,
    player_id: u32,
    hand: Vec<Card>,
    current_lobby: Option<u32>,
}

impl Client {
    /// Connects, completes the name handshake and starts the listener loop.
    pub async fn connect(server_addr: &str, name: &str) -> Result<Self, Box<dyn std::error::Error>> {
        info!("connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        let (mut reader, mut writer) = stream.into_split();

        protocol::write_packet(
            &mut writer,
            &ClientPacket::Connect {
                name: name.to_string(),
            },
        )
        .await?;

        let ack: ServerPacket = protocol::read_packet(&mut reader).await?;
        let player_id = match ack {
            ServerPacket::ConnectAck {
                accepted: true,
                player_id,
                message,
            } => {
                info!("connected: {}", message);
                player_id
            }
            ServerPacket::ConnectAck { message, .. } => {
                return Err(format!("connection refused: {}", message).into());
            }
            other => return Err(format!("unexpected handshake reply: {:?}", other).into()),
        };

        let (packet_tx, packets) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(run_listener(reader, packet_tx));

        Ok(Self {
            writer,
            packets,
            reader_task,
            player_id,
            hand: Vec::new(),
            current_lobby: None,
        })
    }

    /// Runs the interactive loop: console commands out, packets in, until
    /// the user quits or the server goes away.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        console::help();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        None => break,
                        Some(line) => {
                            if self.handle_command(line.trim()).await? {
                                break;
                            }
                        }
                    }
                }
                packet = self.packets.recv() => {
                    match packet {
                        Some(packet) => self.handle_packet(packet),
                        None => {
                            warn!("server connection lost");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Executes one console command. Returns true when the user quits.
    async fn handle_command(&mut self, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(false);
        };

        match command {
            "help" => console::help(),
            "hand" => console::hand(&self.hand),
            "list" => self.send(&ClientPacket::LobbyRequestList).await?,
            "create" => {
                let Some(name) = parts.next() else {
                    console::notice("usage: create <name> [seats] [password]");
                    return Ok(false);
                };
                let max_players = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(MAX_PLAYERS);
                if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
                    console::notice("seats must be between 2 and 6");
                    return Ok(false);
                }
                let password = parts.next().map(str::to_string);
                self.send(&ClientPacket::LobbyCreate {
                    name: name.to_string(),
                    password,
                    max_players,
                })
                .await?;
            }
            "join" => {
                let Some(lobby_id) = parts.next().and_then(|s| s.parse().ok()) else {
                    console::notice("usage: join <id> [password]");
                    return Ok(false);
                };
                let password = parts.next().map(str::to_string);
                self.send(&ClientPacket::LobbyJoin { lobby_id, password }).await?;
            }
            "leave" => {
                if let Some(lobby_id) = self.current_lobby.take() {
                    self.send(&ClientPacket::LobbyLeave { lobby_id }).await?;
                    console::notice("left the lobby");
                } else {
                    console::notice("you are not in a lobby");
                }
            }
            "close" => {
                if let Some(lobby_id) = self.current_lobby {
                    self.send(&ClientPacket::LobbyClose { lobby_id }).await?;
                } else {
                    console::notice("you are not in a lobby");
                }
            }
            "start" => {
                if let Some(lobby_id) = self.current_lobby {
                    self.send(&ClientPacket::LobbyStart { lobby_id }).await?;
                } else {
                    console::notice("you are not in a lobby");
                }
            }
            "play" => {
                let Some(index) = parts.next().and_then(|s| s.parse::<usize>().ok()) else {
                    console::notice("usage: play <index>");
                    return Ok(false);
                };
                if index >= self.hand.len() {
                    console::notice("no card at that index");
                    return Ok(false);
                }
                let card = self.hand.remove(index);
                self.send(&ClientPacket::CardPlay { card }).await?;
            }
            "quit" => return Ok(true),
            other => {
                console::notice(&format!("unknown command '{}'; try 'help'", other));
            }
        }
        Ok(false)
    }

    fn handle_packet(&mut self, packet: ServerPacket) {
        match packet {
            ServerPacket::ConnectAck { message, .. } => {
                debug!("late connect ack: {}", message);
            }
            ServerPacket::LobbyCreateAck {
                lobby_id,
                success,
                message,
            } => {
                console::notice(&message);
                if success {
                    self.current_lobby = Some(lobby_id);
                }
            }
            ServerPacket::LobbyJoinAck {
                lobby_id,
                success,
                message,
            } => {
                console::notice(&message);
                if success {
                    self.current_lobby = Some(lobby_id);
                }
            }
            ServerPacket::LobbyStartAck { success, message, .. } => {
                if !success {
                    console::notice(&message);
                }
            }
            ServerPacket::LobbyClosed { reason, .. } => {
                console::notice(&format!("lobby closed: {}", reason));
                self.current_lobby = None;
                self.hand.clear();
            }
            ServerPacket::LobbyPlayerJoined { player, .. } => {
                console::notice(&format!("{} joined the lobby", player.name));
            }
            ServerPacket::LobbyPlayerLeft { player, .. } => {
                console::notice(&format!("{} left the lobby", player.name));
            }
            ServerPacket::LobbyList { lobbies } => console::lobbies(&lobbies),
            ServerPacket::GameStart { cards } => {
                console::notice("the game begins!");
                self.hand = cards;
                console::hand(&self.hand);
            }
            ServerPacket::PlayerTurn {
                players,
                current,
                parade,
                deck_size,
                ..
            } => {
                console::parade(&parade);
                console::boards(&players);
                let current_name = players
                    .iter()
                    .find(|p| p.id == current)
                    .map(|p| p.name.as_str())
                    .unwrap_or("unknown");
                let own_turn = current == self.player_id;
                console::turn_banner(current_name, own_turn, deck_size);
                if own_turn {
                    console::hand(&self.hand);
                }
            }
            ServerPacket::PlayerDrawnCard { card, deck_size } => {
                console::notice(&format!("you drew {} ({} left)", card, deck_size));
                self.hand.push(card);
            }
            ServerPacket::PlayerReceivedParadeCards { player_id, cards } => {
                let rendered: Vec<String> = cards.iter().map(Card::to_string).collect();
                if player_id == self.player_id {
                    console::notice(&format!("you take from the parade: {}", rendered.join(" ")));
                } else {
                    console::notice(&format!(
                        "player {} takes from the parade: {}",
                        player_id,
                        rendered.join(" ")
                    ));
                }
            }
            ServerPacket::GameDiscard => {
                console::notice("pick a card to discard: play <index>");
                console::hand(&self.hand);
            }
            ServerPacket::GameFinalRound => {
                console::notice("== final round: one last card each, no draws ==");
            }
            ServerPacket::GameEnd { outcome, scores } => {
                console::scores(&outcome, &scores);
                self.current_lobby = None;
                self.hand.clear();
            }
        }
    }

    async fn send(&mut self, packet: &ClientPacket) -> Result<(), Box<dyn std::error::Error>> {
        protocol::write_packet(&mut self.writer, packet).await?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Listener loop: reads one frame at a time and hands it to the pump.
async fn run_listener(mut reader: OwnedReadHalf, packets: mpsc::UnboundedSender<ServerPacket>) {
    loop {
        match protocol::read_packet::<_, ServerPacket>(&mut reader).await {
            Ok(packet) => {
                if packets.send(packet).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("server stream ended: {}", e);
                break;
            }
        }
    }
}
