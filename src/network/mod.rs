//! Network Layer
//!
//! WebSocket transport, room sessions and the lobby.
//! Nothing here is deterministic; all simulation runs through `game/`.

pub mod protocol;
pub mod session;
pub mod lobby;
pub mod server;

pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use session::{RoomSession, TickScheduler};
pub use lobby::{JoinOutcome, Lobby, LobbyError};
pub use server::{GameServer, GameServerError};
