//! Authoritative Simulation Tick
//!
//! One fixed-period step of a room. Pure and synchronous: the same room,
//! fed the same actions between ticks, always ends in the same state.

use crate::config::GameConfig;
use crate::game::events::GameEvent;
use crate::game::input::ScriptedAction;
use crate::game::projectile::update_projectiles;
use crate::game::room::Room;
use crate::game::state::{PlayerId, RoomStatus};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated since the previous drain
    pub events: Vec<GameEvent>,
    /// Whether the room finished this tick
    pub finished: bool,
    /// Winner (if the room finished with one)
    pub winner: Option<PlayerId>,
}

/// Run one simulation tick.
///
/// Order: counters, projectiles, win check. A room that is not `playing`
/// is left untouched.
pub fn tick(room: &mut Room) -> TickResult {
    let mut result = TickResult::default();

    if room.status != RoomStatus::Playing {
        return result;
    }

    // 1. Advance counters by exactly one period
    room.tick_count += 1;
    room.game_time += room.config.tick_period_ms();

    // 2. Projectiles
    update_projectiles(room);

    // 3. Win condition
    if let Some(winner) = check_win_condition(room) {
        room.finish(winner.clone());
        result.finished = true;
        result.winner = winner;
    }

    result.events = room.take_events();
    result
}

/// Returns `Some(winner)` when at most one tank is left standing in a room
/// that had an opponent; the inner value is the survivor, if any.
fn check_win_condition(room: &Room) -> Option<Option<PlayerId>> {
    if room.roster.len() <= 1 || room.alive_count() > 1 {
        return None;
    }
    let survivor = room.players.values().find(|p| p.alive).map(|p| p.id.clone());
    Some(survivor)
}

// =============================================================================
// REPLAY
// =============================================================================

/// Rebuild a room from a seed, a join list and an action script.
///
/// Players join in order; each scripted action is applied just before its
/// tick runs. Used to check that the engine is reproducible.
pub fn replay(
    config: GameConfig,
    seed: u64,
    players: &[(&str, &str)],
    script: &[ScriptedAction],
    ticks: u64,
) -> Room {
    let mut room = Room::new("replay", config, seed);
    for (id, name) in players {
        // Replays only use ids that fit the room
        let _ = room.add_player((*id).into(), (*name).to_string());
    }
    room.start_game();

    for tick_number in 1..=ticks {
        for entry in script.iter().filter(|e| e.tick == tick_number) {
            room.apply_action(&entry.player_id, entry.action, tick_number);
        }
        tick(&mut room);
    }
    room.take_events();
    room
}

// =============================================================================
// TESTS
// =============================================================================
