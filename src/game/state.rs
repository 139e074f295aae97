//! Entity Definitions
//!
//! Plain data for everything a room owns: ids, grid positions, players and
//! projectiles. Behaviour lives in `room`, `movement` and `projectile`.

use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::StateHasher;
use crate::game::input::ActionRecord;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Stable external player identifier.
///
/// Implements Ord so BTreeMap iteration (and hit tie-breaking) is
/// deterministic: the lowest id always comes first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from any string-like id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a new connection.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Direction index outside 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid direction {0}, expected 0..=3")]
pub struct InvalidDirection(pub u8);

/// Cardinal facing. Wire encoding: 0=up, 1=right, 2=down, 3=left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Direction {
    #[default]
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    /// All directions in wire order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    /// Wire index.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Unit step `(dx, dy)`; y grows downwards.
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = InvalidDirection;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Up),
            1 => Ok(Direction::Right),
            2 => Ok(Direction::Down),
            3 => Ok(Direction::Left),
            other => Err(InvalidDirection(other)),
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        direction as u8
    }
}

// =============================================================================
// GRID POSITION
// =============================================================================

/// Integer cell coordinate. Signed so a step off the map is representable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell in `direction`.
    #[inline]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (king-move) distance.
    #[inline]
    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

// =============================================================================
// ROOM STATUS
// =============================================================================

/// Room lifecycle status. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Accepting players, no simulation.
    #[default]
    Waiting,
    /// Tick loop active.
    Playing,
    /// Terminal.
    Finished,
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
        }
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_advance_to(self, next: RoomStatus) -> bool {
        next > self
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A tank in a room.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Stable external id
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Current cell
    pub position: GridPos,

    /// Current facing
    pub direction: Direction,

    /// Remaining health; may go below zero on the killing hit
    pub health: i32,

    /// Kill credit
    pub score: u32,

    /// Display colour token
    pub color: String,

    /// Is the tank still in play?
    pub alive: bool,

    /// Most recent accepted action
    pub last_action: Option<ActionRecord>,

    /// Opaque label of an attached behaviour (bot script), never interpreted
    pub behavior: Option<String>,

    /// Spawn corner held by this player
    pub spawn_slot: usize,
}

impl Player {
    /// Health every tank starts with.
    pub const STARTING_HEALTH: i32 = 100;

    /// Create a player at a spawn corner.
    pub fn new(
        id: PlayerId,
        name: String,
        spawn_slot: usize,
        position: GridPos,
        direction: Direction,
        color: String,
    ) -> Self {
        Self {
            id,
            name,
            position,
            direction,
            health: Self::STARTING_HEALTH,
            score: 0,
            color,
            alive: true,
            last_action: None,
            behavior: None,
            spawn_slot,
        }
    }

    /// Apply projectile damage. Returns true if this hit was the killing one.
    pub fn take_damage(&mut self, damage: i32) -> bool {
        if !self.alive {
            return false;
        }
        self.health -= damage;
        if self.health <= 0 {
            self.alive = false;
            return true;
        }
        false
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_str(self.id.as_str());
        hasher.update_i32(self.position.x);
        hasher.update_i32(self.position.y);
        hasher.update_u8(self.direction.index());
        hasher.update_i32(self.health);
        hasher.update_u32(self.score);
        hasher.update_bool(self.alive);
        hasher.update_u32(self.spawn_slot as u32);
    }
}

// =============================================================================
// PROJECTILE
// =============================================================================

/// A shell in flight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique projectile ID (monotonic per room)
    pub id: u32,

    /// Current cell
    pub position: GridPos,

    /// Travel direction, fixed at spawn
    pub direction: Direction,

    /// Cells per tick
    pub speed: u32,

    /// Shooter
    pub owner_id: PlayerId,

    /// Health removed on hit
    pub damage: i32,

    /// Cells travelled so far
    pub distance: u32,

    /// Travel limit
    pub max_range: u32,
}

impl Projectile {
    /// Hash this projectile's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id);
        hasher.update_i32(self.position.x);
        hasher.update_i32(self.position.y);
        hasher.update_u8(self.direction.index());
        hasher.update_str(self.owner_id.as_str());
        hasher.update_u32(self.distance);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_ordering() {
        let a = PlayerId::from("alpha");
        let b = PlayerId::from("bravo");
        assert!(a < b);
        assert_eq!(a.to_string(), "alpha");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(PlayerId::generate(), PlayerId::generate());
    }

    #[test]
    fn test_direction_wire_encoding() {
        for (i, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.index() as usize, i);
            assert_eq!(Direction::try_from(i as u8), Ok(*dir));
        }
        assert_eq!(Direction::try_from(4), Err(InvalidDirection(4)));

        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), "3");
        assert_eq!(serde_json::from_str::<Direction>("1").unwrap(), Direction::Right);
        assert!(serde_json::from_str::<Direction>("7").is_err());
    }

    #[test]
    fn test_grid_step() {
        let origin = GridPos::new(5, 5);
        assert_eq!(origin.step(Direction::Up), GridPos::new(5, 4));
        assert_eq!(origin.step(Direction::Right), GridPos::new(6, 5));
        assert_eq!(origin.step(Direction::Down), GridPos::new(5, 6));
        assert_eq!(origin.step(Direction::Left), GridPos::new(4, 5));
    }

    #[test]
    fn test_chebyshev() {
        let a = GridPos::new(1, 1);
        assert_eq!(a.chebyshev(GridPos::new(2, 2)), 1);
        assert_eq!(a.chebyshev(GridPos::new(1, 3)), 2);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn test_status_only_advances() {
        assert!(RoomStatus::Waiting.can_advance_to(RoomStatus::Playing));
        assert!(RoomStatus::Waiting.can_advance_to(RoomStatus::Finished));
        assert!(RoomStatus::Playing.can_advance_to(RoomStatus::Finished));
        assert!(!RoomStatus::Finished.can_advance_to(RoomStatus::Playing));
        assert!(!RoomStatus::Playing.can_advance_to(RoomStatus::Waiting));
        assert!(!RoomStatus::Playing.can_advance_to(RoomStatus::Playing));
        assert_eq!(serde_json::to_string(&RoomStatus::Playing).unwrap(), "\"playing\"");
    }

    #[test]
    fn test_damage_and_death() {
        let mut player = Player::new(
            PlayerId::from("p"),
            "P".into(),
            0,
            GridPos::new(1, 1),
            Direction::Up,
            "#ff4d4d".into(),
        );

        assert!(!player.take_damage(25));
        assert_eq!(player.health, 75);
        assert!(player.alive);

        assert!(!player.take_damage(50));
        assert!(player.take_damage(25));
        assert_eq!(player.health, 0);
        assert!(!player.alive);

        // Dead players ignore further damage
        assert!(!player.take_damage(25));
        assert_eq!(player.health, 0);
    }
}
