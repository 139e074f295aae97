//! Lobby
//!
//! Owns the room table: creates rooms on demand, routes joiners into the
//! oldest room with space, and disposes rooms once their last player leaves.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::core::rng::derive_room_seed;
use crate::game::input::Action;
use crate::game::room::{JoinError, Room, RoomId};
use crate::game::snapshot::RoomSnapshot;
use crate::game::state::{Player, PlayerId};
use crate::network::protocol::ServerMessage;
use crate::network::session::RoomSession;

/// Lobby errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// The room refused the player.
    #[error(transparent)]
    Join(#[from] JoinError),

    /// Player is already seated somewhere.
    #[error("Player {0} is already in a room")]
    AlreadyInRoom(PlayerId),
}

/// Result of a successful join.
pub struct JoinOutcome {
    /// Room the player landed in.
    pub session: Arc<RoomSession>,
    /// The player as created.
    pub player: Player,
    /// Room state right after the join.
    pub snapshot: RoomSnapshot,
}

/// Manages all live rooms.
pub struct Lobby {
    /// Settings copied into every new room.
    config: GameConfig,
    /// Live rooms.
    rooms: RwLock<BTreeMap<RoomId, Arc<RoomSession>>>,
    /// Player to room mapping.
    player_rooms: RwLock<BTreeMap<PlayerId, RoomId>>,
    /// Next room number.
    next_room_seq: AtomicU64,
    /// Snapshot feed for monitors.
    monitor_tx: broadcast::Sender<ServerMessage>,
}

impl Lobby {
    /// Create an empty lobby.
    pub fn new(config: GameConfig) -> Self {
        let (monitor_tx, _) = broadcast::channel(256);
        Self {
            config,
            rooms: RwLock::new(BTreeMap::new()),
            player_rooms: RwLock::new(BTreeMap::new()),
            next_room_seq: AtomicU64::new(1),
            monitor_tx,
        }
    }

    /// Room settings.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Receive every room's broadcasts.
    pub fn subscribe_monitor(&self) -> broadcast::Receiver<ServerMessage> {
        self.monitor_tx.subscribe()
    }

    /// Seed for a new room: derived from the configured base seed, or random.
    fn room_seed(&self, room_id: &str) -> u64 {
        match self.config.seed {
            Some(base) => derive_room_seed(base, room_id),
            None => uuid::Uuid::new_v4().as_u128() as u64,
        }
    }

    fn new_session(&self) -> Arc<RoomSession> {
        let seq = self.next_room_seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("room_{}", seq);
        let seed = self.room_seed(&id);
        let room = Room::new(id.clone(), self.config.clone(), seed);
        info!(room = %id, seed, "Created room");
        RoomSession::new(room, seq, self.monitor_tx.clone())
    }

    /// Create and register a new room.
    pub async fn create_room(&self) -> Arc<RoomSession> {
        let session = self.new_session();
        self.rooms.write().await.insert(session.id.clone(), session.clone());
        session
    }

    /// Oldest room that can take another player.
    pub async fn find_available(&self) -> Option<Arc<RoomSession>> {
        let rooms = self.rooms.read().await;
        Self::oldest_open(&rooms).await
    }

    async fn oldest_open(rooms: &BTreeMap<RoomId, Arc<RoomSession>>) -> Option<Arc<RoomSession>> {
        let mut best: Option<&Arc<RoomSession>> = None;
        for session in rooms.values() {
            if best.map_or(false, |b| b.seq < session.seq) {
                continue;
            }
            if session.can_accept_players().await {
                best = Some(session);
            }
        }
        best.cloned()
    }

    /// Seat a player in the oldest open room, creating one if none fits.
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<JoinOutcome, LobbyError> {
        if self.player_rooms.read().await.contains_key(&player_id) {
            return Err(LobbyError::AlreadyInRoom(player_id));
        }

        // Held across find-or-create so two joiners cannot both overfill a room
        let mut rooms = self.rooms.write().await;
        let session = match Self::oldest_open(&rooms).await {
            Some(session) => session,
            None => {
                let session = self.new_session();
                rooms.insert(session.id.clone(), session.clone());
                session
            }
        };

        let (session, player, snapshot) = self
            .seat(&mut rooms, session, player_id.clone(), name, sender)
            .await?;
        drop(rooms);

        self.player_rooms
            .write()
            .await
            .insert(player_id, session.id.clone());

        Ok(JoinOutcome { session, player, snapshot })
    }

    /// Join `session`, or a fresh room if it finished after being picked.
    async fn seat(
        &self,
        rooms: &mut BTreeMap<RoomId, Arc<RoomSession>>,
        session: Arc<RoomSession>,
        player_id: PlayerId,
        name: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(Arc<RoomSession>, Player, RoomSnapshot), LobbyError> {
        match session.join(player_id.clone(), name.clone(), sender.clone()).await {
            Ok((player, snapshot)) => Ok((session, player, snapshot)),
            Err(JoinError::RoomFinished) => {
                debug!(room = %session.id, player = %player_id, "Room finished before join, opening another");
                let fresh = self.new_session();
                rooms.insert(fresh.id.clone(), fresh.clone());
                let (player, snapshot) = fresh.join(player_id, name, sender).await?;
                Ok((fresh, player, snapshot))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a player from its room; disposes the room once empty.
    ///
    /// Returns false if the player was not seated.
    pub async fn leave(&self, player_id: &PlayerId) -> bool {
        let Some(room_id) = self.player_rooms.write().await.remove(player_id) else {
            return false;
        };
        let Some(session) = self.room(&room_id).await else {
            return false;
        };

        if session.leave(player_id).await {
            self.dispose(&room_id).await;
        }
        true
    }

    /// Forward an action to the player's room. Returns false if dropped.
    pub async fn route_action(&self, player_id: &PlayerId, action: Action, timestamp: u64) -> bool {
        let Some(session) = self.player_room(player_id).await else {
            debug!(player = %player_id, "Dropping action from player without a room");
            return false;
        };
        session.apply_action(player_id, action, timestamp).await
    }

    /// Stop a room's tick task and drop it from the table.
    pub async fn dispose(&self, room_id: &RoomId) {
        if let Some(session) = self.rooms.write().await.remove(room_id) {
            session.stop_ticking();
            info!(room = %room_id, "Disposed room");
        }
    }

    /// Look up a room.
    pub async fn room(&self, room_id: &RoomId) -> Option<Arc<RoomSession>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Room a player is seated in.
    pub async fn player_room(&self, player_id: &PlayerId) -> Option<Arc<RoomSession>> {
        let room_id = self.player_rooms.read().await.get(player_id).cloned()?;
        self.room(&room_id).await
    }

    /// Oldest live room, if any.
    pub async fn first_room(&self) -> Option<Arc<RoomSession>> {
        let rooms = self.rooms.read().await;
        rooms.values().min_by_key(|s| s.seq).cloned()
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Stop every room's tick task.
    pub async fn shutdown(&self) {
        let rooms = self.rooms.read().await;
        for session in rooms.values() {
            session.stop_ticking();
        }
    }
}
