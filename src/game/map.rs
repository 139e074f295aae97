//! Arena Tile Map
//!
//! Bordered grid with randomly scattered interior walls. The four corner
//! spawn points and their 3x3 neighbourhoods never receive a generated wall.
//! Generated once per room from the room RNG; immutable afterwards.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::state::{Direction, GridPos};

/// Placement attempts allowed per requested wall.
const ATTEMPTS_PER_WALL: u32 = 5;

/// Number of spawn corners.
pub const SPAWN_SLOTS: usize = 4;

/// Facing a player receives at each spawn corner.
pub const SPAWN_FACING: [Direction; SPAWN_SLOTS] = [Direction::Up; SPAWN_SLOTS];

/// Cell contents. Wire value is the discriminant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    #[default]
    Empty = 0,
    Wall = 1,
}

/// The four spawn points, inset one cell from each corner.
///
/// Order: top-left, top-right, bottom-left, bottom-right.
pub fn spawn_points(width: u32, height: u32) -> [GridPos; SPAWN_SLOTS] {
    let right = width as i32 - 2;
    let bottom = height as i32 - 2;
    [
        GridPos::new(1, 1),
        GridPos::new(right, 1),
        GridPos::new(1, bottom),
        GridPos::new(right, bottom),
    ]
}

/// Row-major grid of tiles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// A map with only the border walls.
    pub fn bordered(width: u32, height: u32) -> Self {
        let mut tiles = vec![Tile::Empty; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    tiles[(y * width + x) as usize] = Tile::Wall;
                }
            }
        }
        Self { width, height, tiles }
    }

    /// Generate a map with up to `wall_count` interior walls.
    ///
    /// Sampling stops after `5 * wall_count` attempts, so dense or tiny maps
    /// simply end up with fewer walls.
    pub fn generate(width: u32, height: u32, wall_count: u32, rng: &mut DeterministicRng) -> Self {
        let mut map = Self::bordered(width, height);

        // No interior to place walls in
        if width < 3 || height < 3 {
            return map;
        }

        let spawns = spawn_points(width, height);
        let max_attempts = wall_count.saturating_mul(ATTEMPTS_PER_WALL);
        let mut placed = 0;
        let mut attempts = 0;

        while placed < wall_count && attempts < max_attempts {
            attempts += 1;

            let candidate = GridPos::new(
                rng.next_int_range(1, width as i32 - 2),
                rng.next_int_range(1, height as i32 - 2),
            );

            if spawns.iter().any(|spawn| spawn.chebyshev(candidate) <= 1) {
                continue;
            }
            if map.is_wall(candidate) {
                continue;
            }

            map.set(candidate, Tile::Wall);
            placed += 1;
        }

        if placed < wall_count {
            tracing::debug!(placed, requested = wall_count, "Map generation placed fewer walls than requested");
        }

        map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Is `pos` inside the grid?
    #[inline]
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Tile at `pos`, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, pos: GridPos) -> Option<Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(self.tiles[self.index(pos)])
    }

    /// Is `pos` a wall? Out-of-bounds cells are not walls; check bounds first.
    #[inline]
    pub fn is_wall(&self, pos: GridPos) -> bool {
        self.get(pos) == Some(Tile::Wall)
    }

    /// Can a tank or projectile occupy `pos`?
    #[inline]
    pub fn is_open(&self, pos: GridPos) -> bool {
        self.get(pos) == Some(Tile::Empty)
    }

    /// Spawn points for this map's size.
    pub fn spawn_points(&self) -> [GridPos; SPAWN_SLOTS] {
        spawn_points(self.width, self.height)
    }

    /// Number of wall cells (border included).
    pub fn wall_count(&self) -> usize {
        self.tiles.iter().filter(|t| **t == Tile::Wall).count()
    }

    /// Wire encoding: rows of `0` (empty) / `1` (wall).
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.tiles
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|tile| *tile as u8).collect())
            .collect()
    }

    fn set(&mut self, pos: GridPos, tile: Tile) {
        let idx = self.index(pos);
        self.tiles[idx] = tile;
    }

    #[inline]
    fn index(&self, pos: GridPos) -> usize {
        (pos.y as u32 * self.width + pos.x as u32) as usize
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_border_walls(map: &TileMap) {
        let (w, h) = (map.width() as i32, map.height() as i32);
        for x in 0..w {
            assert!(map.is_wall(GridPos::new(x, 0)));
            assert!(map.is_wall(GridPos::new(x, h - 1)));
        }
        for y in 0..h {
            assert!(map.is_wall(GridPos::new(0, y)));
            assert!(map.is_wall(GridPos::new(w - 1, y)));
        }
    }

    fn assert_spawn_zones_clear(map: &TileMap) {
        for spawn in map.spawn_points() {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let cell = GridPos::new(spawn.x + dx, spawn.y + dy);
                    let on_border = cell.x == 0
                        || cell.y == 0
                        || cell.x == map.width() as i32 - 1
                        || cell.y == map.height() as i32 - 1;
                    if !on_border {
                        assert!(!map.is_wall(cell), "generated wall at {:?} near spawn {:?}", cell, spawn);
                    }
                }
            }
        }
    }

    #[test]
    fn test_default_map_shape() {
        let mut rng = DeterministicRng::new(12345);
        let map = TileMap::generate(25, 19, 20, &mut rng);

        assert_eq!(map.width(), 25);
        assert_eq!(map.height(), 19);
        assert_border_walls(&map);
        assert_spawn_zones_clear(&map);

        let border = 2 * 25 + 2 * (19 - 2);
        let interior = map.wall_count() - border;
        assert!(interior <= 20);
        assert!(interior > 0);
    }

    #[test]
    fn test_spawn_points() {
        assert_eq!(
            spawn_points(25, 19),
            [
                GridPos::new(1, 1),
                GridPos::new(23, 1),
                GridPos::new(1, 17),
                GridPos::new(23, 17),
            ]
        );
    }

    #[test]
    fn test_same_seed_same_map() {
        let a = TileMap::generate(25, 19, 20, &mut DeterministicRng::new(99));
        let b = TileMap::generate(25, 19, 20, &mut DeterministicRng::new(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_dense_request_terminates() {
        // Every interior cell of a 5x5 map touches a spawn point, so no wall fits

        let mut rng = DeterministicRng::new(1);
        let map = TileMap::generate(5, 5, 1000, &mut rng);
        assert_eq!(map, TileMap::bordered(5, 5));
    }

    #[test]
    fn test_tiny_map_is_all_border() {
        let mut rng = DeterministicRng::new(1);
        let map = TileMap::generate(2, 2, 10, &mut rng);
        assert_eq!(map.wall_count(), 4);
    }

    #[test]
    fn test_bounds_and_walls() {
        let map = TileMap::bordered(6, 6);
        assert!(!map.in_bounds(GridPos::new(-1, 0)));
        assert!(!map.in_bounds(GridPos::new(6, 0)));
        assert!(map.in_bounds(GridPos::new(5, 5)));

        assert!(map.is_wall(GridPos::new(0, 3)));
        assert!(map.is_open(GridPos::new(2, 2)));
        assert!(!map.is_open(GridPos::new(7, 7)));
        assert_eq!(map.get(GridPos::new(7, 7)), None);
    }

    #[test]
    fn test_wire_rows() {
        let rows = TileMap::bordered(5, 5).to_rows();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], vec![1, 1, 1, 1, 1]);
        assert_eq!(rows[2], vec![1, 0, 0, 0, 1]);
    }

    proptest! {
        #[test]
        fn prop_generated_maps_keep_invariants(
            seed in any::<u64>(),
            width in 5u32..40,
            height in 5u32..40,
            walls in 0u32..200,
        ) {
            let mut rng = DeterministicRng::new(seed);
            let map = TileMap::generate(width, height, walls, &mut rng);
            assert_border_walls(&map);
            assert_spawn_zones_clear(&map);

            let border = (2 * width + 2 * (height - 2)) as usize;
            prop_assert!(map.wall_count() - border <= walls as usize);
        }
    }
}
