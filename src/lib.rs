//! # Tank Arena Server
//!
//! Authoritative game-room engine for grid-based tank combat.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TANK ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  config.rs       - TOML + environment configuration          │
//! │                                                              │
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Room simulation (deterministic)           │
//! │  ├── state.rs    - Players, projectiles, directions          │
//! │  ├── input.rs    - Action vocabulary                         │
//! │  ├── map.rs      - Tile map generation                       │
//! │  ├── room.rs     - Roster and lifecycle                      │
//! │  ├── movement.rs - Move/rotate/shoot resolution              │
//! │  ├── projectile.rs - Projectile flight and hits              │
//! │  ├── tick.rs     - Authoritative simulation step             │
//! │  └── snapshot.rs - Client-facing state copies                │
//! │                                                              │
//! │  network/        - Transport (non-deterministic)             │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── session.rs  - Room session and tick task                │
//! │  ├── lobby.rs    - Room table                                │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock and keep all collections in
//! `BTreeMap`/`Vec` order. Given the same seed and the same action script,
//! a room reaches the same state hash on every run.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{AppConfig, GameConfig, ServerConfig, StartPolicy};
pub use crate::core::rng::DeterministicRng;
pub use game::{Action, Direction, PlayerId, Room, RoomSnapshot, RoomStatus};
pub use network::{GameServer, Lobby};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
