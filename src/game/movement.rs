//! Movement & Collision Resolution
//!
//! Applies one player action against the map. Tanks collide with walls and
//! the map edge only; two tanks may share a cell.

use tracing::debug;

use crate::game::input::{Action, ActionRecord};
use crate::game::map::TileMap;
use crate::game::projectile::spawn_projectile;
use crate::game::room::Room;
use crate::game::state::{Direction, GridPos, PlayerId};

/// Target of a one-cell step, if the map lets a tank enter it.
#[inline]
pub fn try_step(map: &TileMap, from: GridPos, direction: Direction) -> Option<GridPos> {
    let target = from.step(direction);
    map.is_open(target).then_some(target)
}

/// Apply `action` for `player_id`. Returns false if the action was dropped.
///
/// Absent or dead players are ignored. A blocked move still counts as an
/// applied action; a shot over the live-projectile cap does not.
pub fn apply_action(room: &mut Room, player_id: &PlayerId, action: Action, timestamp: u64) -> bool {
    let tick = room.tick_count;
    let Some(player) = room.players.get_mut(player_id) else {
        debug!(room = %room.id, player = %player_id, action = action.kind(), "Dropping action from unknown player");
        return false;
    };
    if !player.alive {
        debug!(room = %room.id, player = %player_id, action = action.kind(), "Dropping action from dead player");
        return false;
    }

    match action {
        Action::Rotate { direction } => {
            player.direction = direction;
        }
        Action::Move { direction } => {
            if let Some(target) = try_step(&room.map, player.position, direction) {
                player.position = target;
                player.direction = direction;
            }
        }
        Action::Shoot => {
            if spawn_projectile(room, player_id).is_none() {
                return false;
            }
        }
        Action::Idle => {}
    }

    if let Some(player) = room.players.get_mut(player_id) {
        player.last_action = Some(ActionRecord { action, timestamp, tick });
    }
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use proptest::prelude::*;

    fn playing_room() -> (Room, PlayerId) {
        let config = GameConfig { random_wall_count: 0, ..GameConfig::default() };
        let mut room = Room::new("room_1", config, 3);
        let id = PlayerId::from("tank");
        room.add_player(id.clone(), "Tank".into()).unwrap();
        assert!(room.is_playing());
        (room, id)
    }

    fn place(room: &mut Room, id: &PlayerId, pos: GridPos, direction: Direction) {
        let player = room.players.get_mut(id).unwrap();
        player.position = pos;
        player.direction = direction;
    }

    #[test]
    fn test_rotate() {
        let (mut room, id) = playing_room();
        assert!(apply_action(&mut room, &id, Action::Rotate { direction: Direction::Left }, 5));

        let player = room.player(&id).unwrap();
        assert_eq!(player.direction, Direction::Left);
        assert_eq!(player.position, GridPos::new(1, 1));
        assert_eq!(
            player.last_action,
            Some(ActionRecord { action: Action::Rotate { direction: Direction::Left }, timestamp: 5, tick: 0 })
        );
    }

    #[test]
    fn test_move_into_open_cell() {
        let (mut room, id) = playing_room();
        apply_action(&mut room, &id, Action::Move { direction: Direction::Right }, 0);

        let player = room.player(&id).unwrap();
        assert_eq!(player.position, GridPos::new(2, 1));
        assert_eq!(player.direction, Direction::Right);
    }

    #[test]
    fn test_move_into_wall_changes_nothing() {
        let (mut room, id) = playing_room();
        place(&mut room, &id, GridPos::new(1, 1), Direction::Right);

        // (1,0) is border wall
        assert!(apply_action(&mut room, &id, Action::Move { direction: Direction::Up }, 0));

        let player = room.player(&id).unwrap();
        assert_eq!(player.position, GridPos::new(1, 1));
        assert_eq!(player.direction, Direction::Right);
        assert!(player.last_action.is_some());
    }

    #[test]
    fn test_tanks_may_overlap() {
        let (mut room, a) = playing_room();
        let b = PlayerId::from("other");
        room.add_player(b.clone(), "Other".into()).unwrap();
        place(&mut room, &b, GridPos::new(2, 1), Direction::Up);

        apply_action(&mut room, &a, Action::Move { direction: Direction::Right }, 0);
        assert_eq!(room.player(&a).unwrap().position, room.player(&b).unwrap().position);
    }

    #[test]
    fn test_dead_and_absent_players_dropped() {
        let (mut room, id) = playing_room();
        room.players.get_mut(&id).unwrap().alive = false;

        assert!(!apply_action(&mut room, &id, Action::Move { direction: Direction::Right }, 0));
        assert_eq!(room.player(&id).unwrap().position, GridPos::new(1, 1));
        assert!(room.player(&id).unwrap().last_action.is_none());

        assert!(!apply_action(&mut room, &"ghost".into(), Action::Shoot, 0));
        assert!(room.projectiles.is_empty());
    }

    #[test]
    fn test_idle_only_records() {
        let (mut room, id) = playing_room();
        assert!(apply_action(&mut room, &id, Action::Idle, 9));
        let player = room.player(&id).unwrap();
        assert_eq!(player.position, GridPos::new(1, 1));
        assert_eq!(player.last_action.unwrap().timestamp, 9);
    }

    proptest! {
        #[test]
        fn prop_move_is_one_step_or_nothing(
            seed in any::<u64>(),
            x in 1i32..24,
            y in 1i32..18,
            dir in 0u8..4,
        ) {
            let mut room = Room::new("room_1", GameConfig::default(), seed);
            let id = PlayerId::from("tank");
            room.add_player(id.clone(), "Tank".into()).unwrap();
            let start = GridPos::new(x, y);
            place(&mut room, &id, start, Direction::Up);

            let direction = Direction::try_from(dir).unwrap();
            apply_action(&mut room, &id, Action::Move { direction }, 0);

            let player = room.player(&id).unwrap();
            let stepped = start.step(direction);
            if player.position == start {
                prop_assert!(!room.map.is_open(stepped));
                prop_assert_eq!(player.direction, Direction::Up);
            } else {
                prop_assert_eq!(player.position, stepped);
                prop_assert_eq!(player.direction, direction);
            }
            prop_assert!(room.map.is_open(player.position) || player.position == start);
        }
    }
}
