//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//! Every random decision a room makes (wall layout, tank colours) goes
//! through one of these, so a room seed reproduces the whole match.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use tank_arena::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            Some(&slice[idx])
        }
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a per-room seed from a base seed and the room identifier.
///
/// Two rooms created from the same base seed still get different maps,
/// while a fixed base seed keeps a deployment reproducible.
pub fn derive_room_seed(base_seed: u64, room_id: &str) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"TANK_ARENA_ROOM_SEED_V1");
    hasher.update(base_seed.to_le_bytes());
    hasher.update(room_id.as_bytes());

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        // Same seed must produce same sequence
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_int() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..1000 {
            let val = rng.next_int(100);
            assert!(val < 100);
        }

        // Edge case: max = 0
        assert_eq!(rng.next_int(0), 0);

        // Edge case: max = 1
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_next_int_range() {
        let mut rng = DeterministicRng::new(5678);

        for _ in 0..1000 {
            let val = rng.next_int_range(1, 23);
            assert!((1..=23).contains(&val));
        }

        // Edge case: min = max
        assert_eq!(rng.next_int_range(5, 5), 5);
    }

    #[test]
    fn test_choose() {
        let mut rng = DeterministicRng::new(42);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());

        let palette = ["a", "b", "c"];
        for _ in 0..50 {
            assert!(palette.contains(rng.choose(&palette).unwrap()));
        }
    }

    #[test]
    fn test_derive_room_seed() {
        let seed1 = derive_room_seed(7, "room_1");
        let seed2 = derive_room_seed(7, "room_1");
        assert_eq!(seed1, seed2);

        assert_ne!(seed1, derive_room_seed(7, "room_2"));
        assert_ne!(seed1, derive_room_seed(8, "room_1"));
    }
}
