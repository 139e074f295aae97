//! Game Events
//!
//! Events a room produces while it runs. The session drains them after
//! every mutation and turns the lifecycle ones into protocol messages.

use serde::{Serialize, Deserialize};
use crate::game::state::{GridPos, PlayerId};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player entered the roster
    PlayerJoined {
        player_id: PlayerId,
        spawn: GridPos,
        color: String,
    },

    /// Player left the roster
    PlayerLeft {
        player_id: PlayerId,
    },

    /// Room moved to `playing`
    GameStarted,

    /// Room moved to `finished`
    GameFinished {
        winner_id: Option<PlayerId>,
    },

    /// A shot was accepted
    ProjectileFired {
        projectile_id: u32,
        owner_id: PlayerId,
        origin: GridPos,
    },

    /// A projectile struck a player
    PlayerHit {
        projectile_id: u32,
        victim_id: PlayerId,
        shooter_id: PlayerId,
        damage: i32,
        remaining_health: i32,
    },

    /// A hit was lethal
    PlayerKilled {
        victim_id: PlayerId,
        killer_id: PlayerId,
    },
}

/// A game event stamped with the tick it happened on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Whether the transport forwards this event to clients.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self.data,
            GameEventData::PlayerJoined { .. }
                | GameEventData::PlayerLeft { .. }
                | GameEventData::GameStarted
                | GameEventData::GameFinished { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_classification() {
        let joined = GameEvent::new(
            0,
            GameEventData::PlayerJoined {
                player_id: PlayerId::from("a"),
                spawn: GridPos::new(1, 1),
                color: "#ff4d4d".into(),
            },
        );
        assert!(joined.is_lifecycle());

        let finished = GameEvent::new(9, GameEventData::GameFinished { winner_id: None });
        assert!(finished.is_lifecycle());

        let killed = GameEvent::new(
            3,
            GameEventData::PlayerKilled {
                victim_id: PlayerId::from("b"),
                killer_id: PlayerId::from("a"),
            },
        );
        assert!(!killed.is_lifecycle());
    }
}
