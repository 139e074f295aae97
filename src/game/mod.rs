//! Game Logic Module
//!
//! All room simulation code. Synchronous and deterministic for a given seed.
//!
//! ## Module Structure
//!
//! - `state`: Players, projectiles, ids, grid positions
//! - `input`: Action vocabulary and replay scripts
//! - `map`: Tile map generation
//! - `movement`: Action application against the map
//! - `projectile`: Projectile spawn, flight and hits
//! - `room`: Roster and status lifecycle
//! - `tick`: Authoritative simulation step
//! - `snapshot`: Client-facing state copies
//! - `events`: Game events for the transport layer

pub mod state;
pub mod input;
pub mod map;
pub mod movement;
pub mod projectile;
pub mod room;
pub mod tick;
pub mod snapshot;
pub mod events;

// Re-export key types
pub use input::{Action, ActionRecord, ScriptedAction};
pub use state::{Direction, GridPos, Player, PlayerId, Projectile, RoomStatus};
pub use map::{Tile, TileMap};
pub use room::{JoinError, Room, RoomId};
pub use tick::TickResult;
pub use snapshot::RoomSnapshot;
pub use events::{GameEvent, GameEventData};
