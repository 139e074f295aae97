//! Core deterministic primitives.
//!
//! Seeded randomness and state hashing shared by every room.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, derive_room_seed};
pub use hash::{StateHash, StateHasher, compute_state_hash};
