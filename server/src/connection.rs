//! Per-socket connection controller.
//!
//! Each accepted socket becomes a [`Connection`]: the name handshake runs
//! first under a timeout, then a spawned receive loop forwards every inbound
//! packet to the registry's event channel while the write half stays with
//! whoever currently owns the player (holding pool, lobby or session).

use log::{debug, info, warn};
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::registry::RegistryEvent;
use shared::player::PlayerPublic;
use shared::protocol::{self, ClientPacket, ProtocolError, ServerPacket};
use shared::HANDSHAKE_TIMEOUT_SECS;

/// Why a handshake attempt was turned away.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("no connect message within {HANDSHAKE_TIMEOUT_SECS}s")]
    Timeout,
    #[error("first message was not a connect")]
    WrongMessage,
    #[error("empty player name")]
    EmptyName,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One connected player's socket, receive loop and identity.
///
/// The send path is plain `&mut` — ownership of the `Connection` decides
/// who may write, so two callers can never race on one stream.
#[derive(Debug)]
pub struct Connection {
    pub id: u32,
    pub name: String,
    writer: OwnedWriteHalf,
    reader_task: JoinHandle<()>,
    closed: bool,
}

impl Connection {
    /// Runs the name handshake on a fresh socket and, on success, starts
    /// the receive loop feeding `events`.
    ///
    /// The first packet must be a `Connect` with a non-empty name within
    /// the handshake timeout; anything else gets a negative ack (when the
    /// stream is still writable) and the socket is dropped.
    pub async fn handshake(
        stream: TcpStream,
        id: u32,
        events: mpsc::UnboundedSender<RegistryEvent>,
    ) -> Result<Self, HandshakeError> {
        let (mut read_half, mut write_half) = stream.into_split();

        let deadline = Duration::from_secs(HANDSHAKE_TIMEOUT_SECS);
        let first = timeout(deadline, protocol::read_packet::<_, ClientPacket>(&mut read_half)).await;

        let name = match first {
            Err(_) => {
                reject(&mut write_half, "handshake timed out").await;
                return Err(HandshakeError::Timeout);
            }
            Ok(Err(e)) => {
                reject(&mut write_half, "malformed connect message").await;
                return Err(e.into());
            }
            Ok(Ok(ClientPacket::Connect { name })) => {
                if name.trim().is_empty() {
                    reject(&mut write_half, "player name must not be empty").await;
                    return Err(HandshakeError::EmptyName);
                }
                name
            }
            Ok(Ok(_)) => {
                reject(&mut write_half, "expected a connect message first").await;
                return Err(HandshakeError::WrongMessage);
            }
        };

        let ack = ServerPacket::ConnectAck {
            accepted: true,
            player_id: id,
            message: format!("welcome, {}", name),
        };
        protocol::write_packet(&mut write_half, &ack).await?;
        info!("player {} connected as id {}", name, id);

        let reader_task = tokio::spawn(run_receive_loop(id, read_half, events));

        Ok(Self {
            id,
            name,
            writer: write_half,
            reader_task,
            closed: false,
        })
    }

    /// Serializes and writes one packet, flushing afterwards.
    pub async fn send(&mut self, packet: &ServerPacket) -> Result<(), ProtocolError> {
        protocol::write_packet(&mut self.writer, packet).await
    }

    pub fn public(&self) -> PlayerPublic {
        PlayerPublic {
            id: self.id,
            name: self.name.clone(),
            board: Vec::new(),
        }
    }

    /// Tears the connection down: stops the receive loop and shuts the
    /// socket's write half. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reader_task.abort();
        if let Err(e) = tokio::io::AsyncWriteExt::shutdown(&mut self.writer).await {
            debug!("shutdown of connection {} write half failed: {}", self.id, e);
        }
        info!("connection {} closed", self.id);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // A dropped connection must never leave its reader parked on the socket
        self.reader_task.abort();
    }
}

/// Blocking read loop for one connection. Forwards well-formed packets to
/// the registry channel in arrival order; exits on end-of-stream, an i/o or
/// codec failure, or a dropped registry.
async fn run_receive_loop(
    id: u32,
    mut read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<RegistryEvent>,
) {
    loop {
        match protocol::read_packet::<_, ClientPacket>(&mut read_half).await {
            Ok(ClientPacket::PoisonPill) => {
                // Local sentinel only; a peer putting it on the wire is noise
                warn!("player {} sent a poison pill over the wire, dropping it", id);
            }
            Ok(packet) => {
                if events
                    .send(RegistryEvent::Packet { player_id: id, packet })
                    .is_err()
                {
                    debug!("registry gone, receive loop for {} stopping", id);
                    return;
                }
            }
            Err(ProtocolError::Io(e)) => {
                debug!("connection {} stream ended: {}", id, e);
                break;
            }
            Err(e) => {
                warn!("protocol violation from player {}: {}", id, e);
                break;
            }
        }
    }
    let _ = events.send(RegistryEvent::Disconnected { player_id: id });
}

/// Sends a negative connect ack if the channel still works, then closes.
async fn reject(write_half: &mut OwnedWriteHalf, reason: &str) {
    let packet = ServerPacket::ConnectAck {
        accepted: false,
        player_id: 0,
        message: reason.to_string(),
    };
    if let Err(e) = protocol::write_packet(write_half, &packet).await {
        debug!("could not deliver handshake rejection: {}", e);
    }
    let _ = tokio::io::AsyncWriteExt::shutdown(write_half).await;
}
