//! Room Snapshots
//!
//! The externally visible state of a room. Every snapshot is an owned copy;
//! later room mutation never shows through.

use serde::{Serialize, Deserialize};

use crate::game::room::{Room, RoomId};
use crate::game::state::{Direction, Player, PlayerId, RoomStatus};

/// Player as seen by clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub health: i32,
    pub score: u32,
    pub color: String,
    pub is_alive: bool,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            x: p.position.x,
            y: p.position.y,
            direction: p.direction,
            health: p.health,
            score: p.score,
            color: p.color.clone(),
            is_alive: p.alive,
        }
    }
}

/// Projectile as seen by clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletSnapshot {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub owner_id: PlayerId,
}

/// Full room state broadcast each tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub status: RoomStatus,
    /// Join order
    pub players: Vec<PlayerSnapshot>,
    pub map: Vec<Vec<u8>>,
    pub bullets: Vec<BulletSnapshot>,
    /// Milliseconds of simulated time
    pub game_time: f64,
    pub tick_count: u64,
    pub max_players: usize,
    /// Terrain with living players stamped in
    pub map_with_players: Vec<Vec<u8>>,
}

impl RoomSnapshot {
    /// Copy everything clients need out of `room`.
    pub fn capture(room: &Room) -> Self {
        let players = room
            .roster
            .iter()
            .filter_map(|id| room.players.get(id))
            .map(PlayerSnapshot::from)
            .collect();

        let bullets = room
            .projectiles
            .iter()
            .map(|b| BulletSnapshot {
                id: b.id,
                x: b.position.x,
                y: b.position.y,
                direction: b.direction,
                owner_id: b.owner_id.clone(),
            })
            .collect();

        Self {
            id: room.id.clone(),
            status: room.status,
            players,
            map: room.map.to_rows(),
            bullets,
            game_time: room.game_time,
            tick_count: room.tick_count,
            max_players: room.config.max_players,
            map_with_players: occupancy(room),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Occupancy marker for the player at `join_index`.
#[inline]
pub fn occupancy_marker(join_index: usize) -> u8 {
    (join_index + 2).min(u8::MAX as usize) as u8
}

/// Terrain grid with each living player's cell set to its occupancy marker.
pub fn occupancy(room: &Room) -> Vec<Vec<u8>> {
    let mut grid = room.map.to_rows();
    for (index, id) in room.roster.iter().enumerate() {
        let Some(player) = room.players.get(id).filter(|p| p.alive) else {
            continue;
        };
        if !room.map.in_bounds(player.position) {
            continue;
        }
        grid[player.position.y as usize][player.position.x as usize] = occupancy_marker(index);
    }
    grid
}

// =============================================================================
// TESTS
// =============================================================================
