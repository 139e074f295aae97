//! Room Session Management
//!
//! Binds one [`Room`] to its connected members and its tick task. The room
//! sits behind a single write lock: action application and ticks take it in
//! turn, so they never interleave.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::Action;
use crate::game::room::{JoinError, Room, RoomId};
use crate::game::snapshot::{PlayerSnapshot, RoomSnapshot};
use crate::game::state::{Player, PlayerId};
use crate::game::tick::tick;
use crate::network::protocol::ServerMessage;

// =============================================================================
// TICK SCHEDULER
// =============================================================================

/// Handle to a room's periodic tick task.
///
/// Starting and stopping are both idempotent. `stop` clears the active flag
/// (checked under the room lock before every tick) and aborts the task.
#[derive(Default)]
pub struct TickScheduler {
    active: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TickScheduler {
    /// Is the tick task running?
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flag shared with the task.
    fn flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Claim the scheduler. Returns false if it was already running.
    fn try_activate(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn set_handle(&self, handle: JoinHandle<()>) {
        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
    }

    /// Stop ticking. Safe to call any number of times.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.handle.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

// =============================================================================
// ROOM SESSION
// =============================================================================

/// A room plus everything needed to run it live.
pub struct RoomSession {
    /// Room identifier.
    pub id: RoomId,
    /// Creation order within the lobby.
    pub seq: u64,
    /// Authoritative state.
    room: RwLock<Room>,
    /// Per-member outbound channels.
    members: RwLock<BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>>,
    /// Shared monitor feed.
    monitor_tx: broadcast::Sender<ServerMessage>,
    /// Tick task.
    scheduler: TickScheduler,
}

impl RoomSession {
    /// Wrap a freshly created room.
    pub fn new(room: Room, seq: u64, monitor_tx: broadcast::Sender<ServerMessage>) -> Arc<Self> {
        Arc::new(Self {
            id: room.id.clone(),
            seq,
            room: RwLock::new(room),
            members: RwLock::new(BTreeMap::new()),
            monitor_tx,
            scheduler: TickScheduler::default(),
        })
    }

    /// Add a player and notify the room.
    ///
    /// The joiner receives `joined`, then the room-wide lifecycle messages,
    /// then a full `game_state`.
    pub async fn join(
        self: &Arc<Self>,
        player_id: PlayerId,
        name: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(Player, RoomSnapshot), JoinError> {
        let (player, messages, snapshot, playing, tile_size) = {
            let mut room = self.room.write().await;
            let player = room.add_player(player_id.clone(), name)?;
            let events = room.take_events();
            let messages = lifecycle_messages(&room, events);
            (player, messages, room.snapshot(), room.is_playing(), room.config.tile_size)
        };

        let _ = sender.try_send(ServerMessage::Joined {
            player_id: player_id.clone(),
            room_id: self.id.clone(),
            player: PlayerSnapshot::from(&player),
            tile_size,
        });
        self.members.write().await.insert(player_id, sender.clone());

        for message in messages {
            self.broadcast(message).await;
        }
        let _ = sender.try_send(ServerMessage::GameState(snapshot.clone()));

        if playing {
            self.start_ticking();
        }

        Ok((player, snapshot))
    }

    /// Remove a player and notify the rest. Returns true if the room is now empty.
    pub async fn leave(&self, player_id: &PlayerId) -> bool {
        self.members.write().await.remove(player_id);

        let (messages, empty, finished) = {
            let mut room = self.room.write().await;
            room.remove_player(player_id);
            let events = room.take_events();
            let messages = lifecycle_messages(&room, events);
            (messages, room.players.is_empty(), room.is_finished())
        };

        if finished {
            self.stop_ticking();
        }
        for message in messages {
            self.broadcast(message).await;
        }
        empty
    }

    /// Apply an action under the room lock.
    pub async fn apply_action(&self, player_id: &PlayerId, action: Action, timestamp: u64) -> bool {
        let mut room = self.room.write().await;
        room.apply_action(player_id, action, timestamp)
    }

    /// Owned snapshot of the room.
    pub async fn snapshot(&self) -> RoomSnapshot {
        self.room.read().await.snapshot()
    }

    pub async fn can_accept_players(&self) -> bool {
        self.room.read().await.can_accept_players()
    }

    pub async fn player_count(&self) -> usize {
        self.room.read().await.players.len()
    }

    /// Send to every member without waiting on slow receivers.
    pub async fn broadcast(&self, message: ServerMessage) {
        let members = self.members.read().await;
        for (player_id, sender) in members.iter() {
            if sender.try_send(message.clone()).is_err() {
                debug!(room = %self.id, player = %player_id, "Dropping message for slow or closed client");
            }
        }
    }

    // =========================================================================
    // TICKING
    // =========================================================================

    /// Start the periodic tick task if it is not running.
    pub fn start_ticking(self: &Arc<Self>) {
        if !self.scheduler.try_activate() {
            return;
        }
        let session = Arc::clone(self);
        let active = self.scheduler.flag();
        let handle = tokio::spawn(async move {
            session.run_tick_loop(active).await;
        });
        self.scheduler.set_handle(handle);
        info!(room = %self.id, "Tick loop started");
    }

    /// Stop the tick task. Idempotent.
    pub fn stop_ticking(&self) {
        if self.scheduler.is_active() {
            info!(room = %self.id, "Tick loop stopped");
        }
        self.scheduler.stop();
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_active()
    }

    async fn run_tick_loop(&self, active: Arc<AtomicBool>) {
        let period = {
            let room = self.room.read().await;
            Duration::from_micros(1_000_000 / room.config.tick_rate.max(1) as u64)
        };
        let mut tick_interval = interval(period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        tick_interval.tick().await;

        loop {
            tick_interval.tick().await;

            let (messages, snapshot, finished) = {
                let mut room = self.room.write().await;

                if !active.load(Ordering::SeqCst) || !room.is_playing() {
                    break;
                }

                let result = tick(&mut room);
                let messages = lifecycle_messages(&room, result.events);
                let snapshot = room.is_playing().then(|| room.snapshot());
                (messages, snapshot, result.finished)
            };

            for message in messages {
                self.publish(message).await;
            }
            if let Some(snapshot) = snapshot {
                self.publish(ServerMessage::GameState(snapshot)).await;
            }

            if finished {
                break;
            }
        }

        active.store(false, Ordering::SeqCst);
        debug!(room = %self.id, "Tick loop exited");
    }

    /// Send to members and monitors.
    async fn publish(&self, message: ServerMessage) {
        // No monitors subscribed is fine
        let _ = self.monitor_tx.send(message.clone());
        self.broadcast(message).await;
    }
}

/// Protocol messages for the lifecycle events in `events`.
fn lifecycle_messages(room: &Room, events: Vec<GameEvent>) -> Vec<ServerMessage> {
    let room_id = &room.id;
    events
        .into_iter()
        .filter(GameEvent::is_lifecycle)
        .filter_map(|event| match event.data {
            GameEventData::PlayerJoined { player_id, .. } => room
                .player(&player_id)
                .map(|player| ServerMessage::PlayerJoined { player: PlayerSnapshot::from(player) }),
            GameEventData::PlayerLeft { player_id } => Some(ServerMessage::PlayerLeft { player_id }),
            GameEventData::GameStarted => Some(ServerMessage::GameStarted { room_id: room_id.clone() }),
            GameEventData::GameFinished { winner_id } => Some(ServerMessage::GameFinished {
                room_id: room_id.clone(),
                winner_id,
            }),
            _ => None,
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
