//! Projectile Subsystem
//!
//! Spawning, per-tick advance, projectile/projectile annihilation and
//! projectile/player hits. Each tick runs in phases over post-advance
//! positions so the result never depends on list order.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::game::events::GameEventData;
use crate::game::map::TileMap;
use crate::game::room::Room;
use crate::game::state::{PlayerId, Projectile};

/// Cells a projectile may travel before it expires.
pub const PROJECTILE_RANGE: u32 = 3;

/// Live projectiles a single player may own at once.
pub const MAX_LIVE_PROJECTILES: usize = 3;

/// Live projectiles owned by `owner`.
pub fn live_count(projectiles: &[Projectile], owner: &PlayerId) -> usize {
    projectiles.iter().filter(|p| &p.owner_id == owner).count()
}

/// Fire from the owner's cell along its facing.
///
/// Returns the new projectile id, or `None` if the owner is missing, dead or
/// already at the live-projectile cap.
pub fn spawn_projectile(room: &mut Room, owner: &PlayerId) -> Option<u32> {
    let shooter = room.players.get(owner).filter(|p| p.alive)?;

    if live_count(&room.projectiles, owner) >= MAX_LIVE_PROJECTILES {
        debug!(room = %room.id, player = %owner, "Shot dropped, projectile cap reached");
        return None;
    }

    let id = room.next_projectile_id;
    room.next_projectile_id += 1;

    let projectile = Projectile {
        id,
        position: shooter.position,
        direction: shooter.direction,
        speed: room.config.bullet_speed,
        owner_id: owner.clone(),
        damage: room.config.bullet_damage,
        distance: 0,
        max_range: PROJECTILE_RANGE,
    };
    let origin = projectile.position;
    room.projectiles.push(projectile);

    room.push_event(GameEventData::ProjectileFired {
        projectile_id: id,
        owner_id: owner.clone(),
        origin,
    });
    Some(id)
}

/// Move a projectile `speed` cells, one at a time.
///
/// Returns false as soon as it reaches its range, leaves the map or enters a
/// wall, so fast projectiles cannot skip over walls.
fn advance(projectile: &mut Projectile, map: &TileMap) -> bool {
    for _ in 0..projectile.speed {
        projectile.position = projectile.position.step(projectile.direction);
        projectile.distance += 1;

        if projectile.distance >= projectile.max_range || !map.is_open(projectile.position) {
            return false;
        }
    }
    true
}

/// Ids of projectiles that share a cell with another owner's projectile.
fn annihilated(projectiles: &[Projectile]) -> BTreeSet<u32> {
    let mut removed = BTreeSet::new();
    for (i, a) in projectiles.iter().enumerate() {
        for b in &projectiles[i + 1..] {
            if a.position == b.position && a.owner_id != b.owner_id {
                removed.insert(a.id);
                removed.insert(b.id);
            }
        }
    }
    removed
}

/// Run the projectile step for one tick.
pub fn update_projectiles(room: &mut Room) {
    // Phase 1: advance and expire
    let mut survivors: Vec<Projectile> = std::mem::take(&mut room.projectiles)
        .into_iter()
        .filter_map(|mut p| advance(&mut p, &room.map).then_some(p))
        .collect();

    // Phase 2: mutual annihilation between owners
    let removed = annihilated(&survivors);
    if !removed.is_empty() {
        survivors.retain(|p| !removed.contains(&p.id));
    }

    // Phase 3: player hits
    let mut remaining = Vec::with_capacity(survivors.len());
    for projectile in survivors {
        // BTreeMap order: the lowest id wins when tanks overlap
        let victim_id = room
            .players
            .values()
            .find(|p| p.alive && p.id != projectile.owner_id && p.position == projectile.position)
            .map(|p| p.id.clone());

        match victim_id {
            Some(victim_id) => resolve_hit(room, &projectile, victim_id),
            None => remaining.push(projectile),
        }
    }

    room.projectiles = remaining;
}

fn resolve_hit(room: &mut Room, projectile: &Projectile, victim_id: PlayerId) {
    let Some(victim) = room.players.get_mut(&victim_id) else {
        return;
    };
    let killed = victim.take_damage(projectile.damage);
    let remaining_health = victim.health;

    room.push_event(GameEventData::PlayerHit {
        projectile_id: projectile.id,
        victim_id: victim_id.clone(),
        shooter_id: projectile.owner_id.clone(),
        damage: projectile.damage,
        remaining_health,
    });

    if !killed {
        return;
    }

    let kill_score = room.config.kill_score;
    if let Some(shooter) = room.players.get_mut(&projectile.owner_id) {
        shooter.score += kill_score;
    }
    info!(room = %room.id, victim = %victim_id, killer = %projectile.owner_id, "Player killed");
    room.push_event(GameEventData::PlayerKilled {
        victim_id,
        killer_id: projectile.owner_id.clone(),
    });
}

// =============================================================================
// TESTS
// =============================================================================
