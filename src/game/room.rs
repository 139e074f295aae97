//! Room Lifecycle
//!
//! One isolated match: map, roster, projectiles, counters and the seeded RNG.
//! Status only moves forward (`waiting -> playing -> finished`).
//!
//! A `Room` is plain synchronous state. The session layer wraps it in a lock
//! and drives [`crate::game::tick::tick`] on a timer; nothing in here reads
//! the clock or touches the network.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::DeterministicRng;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::Action;
use crate::game::map::{TileMap, SPAWN_FACING, SPAWN_SLOTS};
use crate::game::movement;
use crate::game::snapshot::RoomSnapshot;
use crate::game::state::{Player, PlayerId, Projectile, RoomStatus};

/// Room identifier (`room_<n>`).
pub type RoomId = String;

/// Display colours handed out to joining tanks.
pub const PLAYER_COLORS: [&str; 4] = ["#ff4d4d", "#4dff4d", "#4d4dff", "#ffff4d"];

/// Why a join was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Room is full ({max_players} players)")]
    RoomFull { max_players: usize },

    #[error("Room has already finished")]
    RoomFinished,

    #[error("Player {0} is already in this room")]
    AlreadyInRoom(PlayerId),
}

/// Authoritative state of one match.
#[derive(Clone, Debug)]
pub struct Room {
    /// Room identifier
    pub id: RoomId,

    /// Settings fixed at creation
    pub config: GameConfig,

    /// Lifecycle status
    pub status: RoomStatus,

    /// Terrain, immutable after creation
    pub map: TileMap,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, Player>,

    /// Player ids in join order
    pub roster: Vec<PlayerId>,

    /// Live projectiles, in spawn order
    pub projectiles: Vec<Projectile>,

    /// Simulation time in milliseconds
    pub game_time: f64,

    /// Ticks simulated so far
    pub tick_count: u64,

    /// Deterministic RNG
    pub rng: DeterministicRng,

    /// Seed the RNG was created from
    pub rng_seed: u64,

    /// Next projectile ID
    pub next_projectile_id: u32,

    /// Winner, once finished with one
    pub winner: Option<PlayerId>,

    pending_events: Vec<GameEvent>,
}

impl Room {
    /// Create a waiting room and generate its map from `seed`.
    pub fn new(id: impl Into<RoomId>, config: GameConfig, seed: u64) -> Self {
        let mut rng = DeterministicRng::new(seed);
        let map = TileMap::generate(
            config.map_width,
            config.map_height,
            config.random_wall_count,
            &mut rng,
        );

        Self {
            id: id.into(),
            config,
            status: RoomStatus::Waiting,
            map,
            players: BTreeMap::new(),
            roster: Vec::new(),
            projectiles: Vec::new(),
            game_time: 0.0,
            tick_count: 0,
            rng,
            rng_seed: seed,
            next_projectile_id: 1,
            winner: None,
            pending_events: Vec::new(),
        }
    }

    // =========================================================================
    // ROSTER
    // =========================================================================

    /// Can another player join?
    pub fn can_accept_players(&self) -> bool {
        self.status != RoomStatus::Finished && self.roster.len() < self.config.max_players
    }

    /// Add a player at the next free spawn corner.
    ///
    /// Starts the game when the start policy becomes satisfied.
    pub fn add_player(&mut self, id: PlayerId, name: String) -> Result<Player, JoinError> {
        if self.status == RoomStatus::Finished {
            return Err(JoinError::RoomFinished);
        }
        if self.players.contains_key(&id) {
            return Err(JoinError::AlreadyInRoom(id));
        }
        if self.roster.len() >= self.config.max_players {
            return Err(JoinError::RoomFull { max_players: self.config.max_players });
        }

        let slot = self.assign_spawn_slot();
        let spawn = self.map.spawn_points()[slot];
        let color = self
            .rng
            .choose(&PLAYER_COLORS)
            .copied()
            .unwrap_or(PLAYER_COLORS[0])
            .to_string();

        let player = Player::new(id.clone(), name, slot, spawn, SPAWN_FACING[slot], color.clone());
        self.players.insert(id.clone(), player.clone());
        self.roster.push(id.clone());

        info!(room = %self.id, player = %id, slot, "Player joined");
        self.push_event(GameEventData::PlayerJoined { player_id: id, spawn, color });

        if self.status == RoomStatus::Waiting
            && self.config.start_policy.is_satisfied(self.roster.len(), self.config.max_players)
        {
            self.start_game();
        }

        Ok(player)
    }

    /// Remove a player. Returns false if the id was not present.
    ///
    /// An empty room is finished immediately.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        if self.players.remove(id).is_none() {
            return false;
        }
        self.roster.retain(|p| p != id);

        info!(room = %self.id, player = %id, remaining = self.roster.len(), "Player left");
        self.push_event(GameEventData::PlayerLeft { player_id: id.clone() });

        if self.roster.is_empty() {
            self.finish(None);
        }
        true
    }

    /// Pick a spawn slot: start at `roster % 4` and take the first free one.
    fn assign_spawn_slot(&self) -> usize {
        let candidate = self.roster.len() % SPAWN_SLOTS;
        let mut held = [false; SPAWN_SLOTS];
        for player in self.players.values() {
            held[player.spawn_slot] = true;
        }

        for offset in 0..SPAWN_SLOTS {
            let slot = (candidate + offset) % SPAWN_SLOTS;
            if !held[slot] {
                return slot;
            }
        }

        debug_assert!(
            self.roster.len() >= SPAWN_SLOTS,
            "no free spawn slot with only {} players present",
            self.roster.len()
        );
        warn!(room = %self.id, slot = candidate, "All spawn slots held, sharing a corner");
        candidate
    }

    /// Living players.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    /// `waiting -> playing`. Returns false if the room was not waiting.
    pub fn start_game(&mut self) -> bool {
        if !self.status.can_advance_to(RoomStatus::Playing) {
            return false;
        }
        self.status = RoomStatus::Playing;
        info!(room = %self.id, players = self.roster.len(), "Game started");
        self.push_event(GameEventData::GameStarted);
        true
    }

    /// Move to `finished`. Returns false if already finished.
    pub fn finish(&mut self, winner: Option<PlayerId>) -> bool {
        if !self.status.can_advance_to(RoomStatus::Finished) {
            return false;
        }
        self.status = RoomStatus::Finished;
        self.winner = winner.clone();
        info!(
            room = %self.id,
            tick = self.tick_count,
            winner = ?winner.as_ref().map(PlayerId::as_str),
            "Game finished"
        );
        self.push_event(GameEventData::GameFinished { winner_id: winner });
        true
    }

    pub fn is_playing(&self) -> bool {
        self.status == RoomStatus::Playing
    }

    pub fn is_finished(&self) -> bool {
        self.status == RoomStatus::Finished
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Apply an action from a player. Returns false if it was dropped.
    ///
    /// Only a playing room accepts actions.
    pub fn apply_action(&mut self, player_id: &PlayerId, action: Action, timestamp: u64) -> bool {
        if !self.is_playing() {
            debug!(
                room = %self.id,
                player = %player_id,
                action = action.kind(),
                status = self.status.as_str(),
                "Dropping action, room not playing"
            );
            return false;
        }
        movement::apply_action(self, player_id, action, timestamp)
    }

    // =========================================================================
    // OUTPUT
    // =========================================================================

    /// Owned copy of the externally visible state.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot::capture(self)
    }

    /// Hash of the simulation state, for replay checks.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick_count, self.rng_seed, |hasher| {
            hasher.update_u8(self.status as u8);
            hasher.update_u32(self.players.len() as u32);
            for player in self.players.values() {
                player.hash_into(hasher);
            }
            hasher.update_u32(self.projectiles.len() as u32);
            for projectile in &self.projectiles {
                projectile.hash_into(hasher);
            }
            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);
        })
    }

    /// Record an event stamped with the current tick.
    pub fn push_event(&mut self, data: GameEventData) {
        self.pending_events.push(GameEvent::new(self.tick_count, data));
    }

    /// Drain pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartPolicy;
    use crate::game::state::GridPos;

    fn config(max_players: usize, start_policy: StartPolicy) -> GameConfig {
        GameConfig {
            max_players,
            start_policy,
            ..GameConfig::default()
        }
    }

    fn waiting_room(max_players: usize) -> Room {
        Room::new("room_1", config(max_players, StartPolicy::FullRoster), 42)
    }

    #[test]
    fn test_new_room() {
        let room = Room::new("room_1", GameConfig::default(), 42);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.map.width(), 25);
        assert_eq!(room.map.height(), 19);
        assert!(room.players.is_empty());
        assert_eq!(room.tick_count, 0);
        assert!(room.can_accept_players());
    }

    #[test]
    fn test_join_assigns_corners_in_order() {
        let mut room = waiting_room(4);
        let expected = [
            GridPos::new(1, 1),
            GridPos::new(23, 1),
            GridPos::new(1, 17),
            GridPos::new(23, 17),
        ];

        for (i, spawn) in expected.iter().enumerate() {
            let player = room.add_player(PlayerId::new(format!("p{}", i)), format!("P{}", i)).unwrap();
            assert_eq!(player.spawn_slot, i);
            assert_eq!(player.position, *spawn);
            assert_eq!(player.health, 100);
            assert_eq!(player.score, 0);
            assert!(player.alive);
            assert!(PLAYER_COLORS.contains(&player.color.as_str()));
        }
    }

    #[test]
    fn test_join_rejections() {
        let mut room = waiting_room(2);
        room.add_player("a".into(), "A".into()).unwrap();

        assert_eq!(
            room.add_player("a".into(), "A".into()).err(),
            Some(JoinError::AlreadyInRoom("a".into()))
        );

        room.add_player("b".into(), "B".into()).unwrap();
        assert!(!room.can_accept_players());
        assert_eq!(
            room.add_player("c".into(), "C".into()).err(),
            Some(JoinError::RoomFull { max_players: 2 })
        );
        assert_eq!(room.roster.len(), 2);

        room.finish(None);
        room.remove_player(&"b".into());
        assert_eq!(
            room.add_player("c".into(), "C".into()).err(),
            Some(JoinError::RoomFinished)
        );
    }

    #[test]
    fn test_vacated_slot_is_reused_without_collision() {
        let mut room = waiting_room(4);
        room.add_player("a".into(), "A".into()).unwrap();
        room.add_player("b".into(), "B".into()).unwrap();
        room.add_player("c".into(), "C".into()).unwrap();

        // Slot 1 frees up; roster size 2 would pick slot 2, which is held
        room.remove_player(&"b".into());
        let d = room.add_player("d".into(), "D".into()).unwrap();
        assert_eq!(d.spawn_slot, 3);

        let e = room.add_player("e".into(), "E".into()).unwrap();
        assert_eq!(e.spawn_slot, 1);

        let mut slots: Vec<usize> = room.players.values().map(|p| p.spawn_slot).collect();
        slots.sort();
        slots.dedup();
        assert_eq!(slots.len(), room.players.len());
    }

    #[test]
    fn test_more_than_four_players_share_corners() {
        let mut room = Room::new("room_1", config(6, StartPolicy::FullRoster), 7);
        for i in 0..6 {
            room.add_player(PlayerId::new(format!("p{}", i)), "P".into()).unwrap();
        }
        assert_eq!(room.players.len(), 6);
        assert_eq!(room.player(&"p4".into()).unwrap().spawn_slot, 0);
    }

    #[test]
    fn test_start_policy_triggers_start() {
        let mut room = Room::new("room_1", config(4, StartPolicy::MinPlayers { count: 2 }), 1);
        room.add_player("a".into(), "A".into()).unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);

        room.add_player("b".into(), "B".into()).unwrap();
        assert_eq!(room.status, RoomStatus::Playing);

        let events = room.take_events();
        assert!(events.iter().any(|e| e.data == GameEventData::GameStarted));
        assert!(room.take_events().is_empty());
    }

    #[test]
    fn test_default_policy_starts_on_first_join() {
        let mut room = Room::new("room_1", GameConfig::default(), 1);
        room.add_player("a".into(), "A".into()).unwrap();
        assert!(room.is_playing());
    }

    #[test]
    fn test_remove_player() {
        let mut room = waiting_room(4);
        room.add_player("a".into(), "A".into()).unwrap();
        room.add_player("b".into(), "B".into()).unwrap();

        assert!(room.remove_player(&"a".into()));
        assert!(!room.remove_player(&"a".into()));
        assert!(!room.remove_player(&"zzz".into()));
        assert_eq!(room.roster, vec![PlayerId::from("b")]);
        assert_eq!(room.status, RoomStatus::Waiting);

        // Last one out finishes the room
        assert!(room.remove_player(&"b".into()));
        assert_eq!(room.status, RoomStatus::Finished);
        assert!(!room.can_accept_players());
    }

    #[test]
    fn test_status_never_moves_backwards() {
        let mut room = waiting_room(4);
        assert!(room.start_game());
        assert!(!room.start_game());
        assert!(room.finish(None));
        assert!(!room.finish(Some("a".into())));
        assert!(!room.start_game());
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.winner, None);
    }

    #[test]
    fn test_actions_dropped_unless_playing() {
        let mut room = waiting_room(4);
        room.add_player("a".into(), "A".into()).unwrap();
        assert!(!room.apply_action(&"a".into(), Action::Shoot, 0));
        assert!(room.projectiles.is_empty());
    }

    #[test]
    fn test_hash_tracks_state() {
        let mut a = waiting_room(4);
        let mut b = waiting_room(4);
        a.add_player("x".into(), "X".into()).unwrap();
        b.add_player("x".into(), "X".into()).unwrap();
        assert_eq!(a.compute_hash(), b.compute_hash());

        b.players.get_mut(&PlayerId::from("x")).unwrap().health -= 1;
        assert_ne!(a.compute_hash(), b.compute_hash());
    }
}
