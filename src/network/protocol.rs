//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON object tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::game::input::Action;
use crate::game::room::RoomId;
use crate::game::snapshot::{PlayerSnapshot, RoomSnapshot};
use crate::game::state::PlayerId;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the first room with space (or a new one).
    JoinGame {
        #[serde(default)]
        player_name: Option<String>,
    },

    /// Act in the joined room.
    PlayerAction { action: Action },

    /// Subscribe to every room's snapshots without playing.
    MonitorMode { is_monitor: bool },

    /// Leave the current room.
    Leave,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted.
    Joined {
        player_id: PlayerId,
        room_id: RoomId,
        player: PlayerSnapshot,
        /// Pixel size of one tile, for rendering.
        tile_size: u32,
    },

    /// Join refused.
    JoinError { message: String },

    /// Full room state (every tick while playing, and on join).
    GameState(RoomSnapshot),

    /// Someone joined the room.
    PlayerJoined { player: PlayerSnapshot },

    /// Someone left the room.
    PlayerLeft { player_id: PlayerId },

    /// Simulation started.
    GameStarted { room_id: RoomId },

    /// Simulation over.
    GameFinished {
        room_id: RoomId,
        winner_id: Option<PlayerId>,
    },

    /// Monitor subscription confirmed.
    MonitorConnected {
        success: bool,
        room_id: String,
        game_state: Option<RoomSnapshot>,
        message: String,
        tile_size: u32,
    },

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame did not decode.
    InvalidMessage,
    /// Sender is not in a room.
    NotInRoom,
    /// Sender is already in a room.
    AlreadyInRoom,
    /// Server at connection capacity.
    ServerOverloaded,
}

impl ServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Outcome of decoding one inbound text frame.
#[derive(Debug)]
pub enum ClientFrame {
    /// A well-formed message.
    Message(ClientMessage),
    /// A `player_action` whose action did not decode. Dropped without reply.
    DroppedAction(serde_json::Error),
    /// Anything else that did not decode.
    Malformed(serde_json::Error),
}

impl ClientFrame {
    /// Decode a frame, telling bad actions apart from bad frames.
    pub fn decode(s: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(s) {
            Ok(v) => v,
            Err(e) => return ClientFrame::Malformed(e),
        };
        let is_action = value.get("type").and_then(|t| t.as_str()) == Some("player_action");
        match serde_json::from_value(value) {
            Ok(msg) => ClientFrame::Message(msg),
            Err(e) if is_action => ClientFrame::DroppedAction(e),
            Err(e) => ClientFrame::Malformed(e),
        }
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Error frame shorthand.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::new(code, message))
    }
}
