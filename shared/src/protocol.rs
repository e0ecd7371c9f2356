//! Wire protocol: packet taxonomies and the length-framed bincode codec.
//!
//! Every message on the stream is a 4-byte big-endian length followed by a
//! bincode-serialized packet. Client-to-server and server-to-client traffic
//! use disjoint enums so each side can match exhaustively on exactly the
//! kinds it can legally receive.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cards::Card;
use crate::player::PlayerPublic;
use crate::score::GameOutcome;

/// Upper bound on a single frame; anything larger is a protocol violation.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),
}

/// One entry of the lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: u32,
    pub name: String,
    pub players: usize,
    pub max_players: usize,
    pub private: bool,
}

/// Packets a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    /// Handshake opener; must arrive first and carry a non-empty name.
    Connect { name: String },
    LobbyCreate {
        name: String,
        password: Option<String>,
        max_players: usize,
    },
    LobbyJoin {
        lobby_id: u32,
        password: Option<String>,
    },
    LobbyLeave { lobby_id: u32 },
    LobbyClose { lobby_id: u32 },
    LobbyStart { lobby_id: u32 },
    LobbyRequestList,
    /// A card play or discard selection, depending on the game phase.
    CardPlay { card: Card },
    /// Local sentinel used to unblock consumer loops on shutdown. Never
    /// valid on the wire; a peer sending it is treated as misbehaving.
    PoisonPill,
}

/// Packets the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    ConnectAck {
        accepted: bool,
        player_id: u32,
        message: String,
    },
    LobbyCreateAck {
        lobby_id: u32,
        success: bool,
        message: String,
    },
    LobbyJoinAck {
        lobby_id: u32,
        success: bool,
        message: String,
    },
    LobbyStartAck {
        lobby_id: u32,
        success: bool,
        message: String,
    },
    LobbyClosed { lobby_id: u32, reason: String },
    LobbyPlayerJoined { lobby_id: u32, player: PlayerPublic },
    LobbyPlayerLeft { lobby_id: u32, player: PlayerPublic },
    LobbyList { lobbies: Vec<LobbySummary> },
    /// Deal announcement carrying the recipient's opening hand.
    GameStart { cards: Vec<Card> },
    /// Turn prompt; `current` names the player whose play is awaited.
    PlayerTurn {
        players: Vec<PlayerPublic>,
        current: u32,
        parade: Vec<Card>,
        deck_size: usize,
        hand_size: usize,
    },
    /// Replacement card, sent only to the player who drew it.
    PlayerDrawnCard { card: Card, deck_size: usize },
    /// Broadcast when a play captures parade cards.
    PlayerReceivedParadeCards { player_id: u32, cards: Vec<Card> },
    /// Prompt to pick the next discard during the discard phase.
    GameDiscard,
    GameFinalRound,
    GameEnd {
        outcome: GameOutcome,
        scores: Vec<(PlayerPublic, u32)>,
    },
}

/// Serializes `packet` and writes it as one frame, flushing afterwards.
pub async fn write_packet<W, P>(writer: &mut W, packet: &P) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    P: Serialize,
{
    let data = bincode::serialize(packet)?;
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame and deserializes it. Blocks until a full frame arrives,
/// the peer closes the stream, or the frame is invalid.
pub async fn read_packet<R, P>(reader: &mut R) -> Result<P, ProtocolError>
where
    R: AsyncRead + Unpin,
    P: DeserializeOwned,
{
    let mut length_buf = [0u8; 4];
    reader.read_exact(&mut length_buf).await?;
    let length = u32::from_be_bytes(length_buf) as usize;
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let mut frame = vec![0u8; length];
    reader.read_exact(&mut frame).await?;
    Ok(bincode::deserialize(&frame)?)
}
