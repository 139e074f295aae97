//! Player Actions
//!
//! The closed action vocabulary every client (human, bot, replay script)
//! speaks. Decoding is strict: an unknown `type` or a direction outside
//! 0..=3 fails to deserialize and never reaches a room.

use serde::{Serialize, Deserialize};
use crate::game::state::{Direction, PlayerId};

// =============================================================================
// ACTION TYPES
// =============================================================================

/// A single player action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Step one cell and face `direction` (only if the target is open).
    Move { direction: Direction },
    /// Face `direction` without moving.
    Rotate { direction: Direction },
    /// Fire a projectile along the current facing.
    Shoot,
    /// Do nothing.
    Idle,
}

impl Action {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Rotate { .. } => "rotate",
            Action::Shoot => "shoot",
            Action::Idle => "idle",
        }
    }
}

/// Last accepted action of a player, kept for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// The action as applied
    pub action: Action,

    /// Wall-clock milliseconds supplied by the transport
    pub timestamp: u64,

    /// Room tick counter when the action was applied
    pub tick: u64,
}

// =============================================================================
// REPLAY SCRIPT
// =============================================================================

/// One entry of a replay script: apply `action` for `player_id` just before
/// tick `tick` runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedAction {
    pub tick: u64,
    pub player_id: PlayerId,
    pub action: Action,
}

impl ScriptedAction {
    pub fn new(tick: u64, player_id: impl Into<PlayerId>, action: Action) -> Self {
        Self {
            tick,
            player_id: player_id.into(),
            action,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
