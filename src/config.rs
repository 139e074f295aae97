//! Server and room configuration.
//!
//! Loaded once at startup: TOML file (optional) → environment overrides →
//! validation. Rooms receive a copy of [`GameConfig`] at creation time and
//! never read configuration from anywhere else.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`AppConfig`].
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override has an unusable value.
    #[error("Invalid value for {key}: {value}")]
    InvalidOverride {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// A setting is outside its supported range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Network settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Per-room simulation settings.
    #[serde(default)]
    pub game: GameConfig,
}

impl AppConfig {
    /// Load configuration: file (if present), then environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                info!("Loaded config from {}", path.display());
                toml::from_str(&contents)?
            }
            Some(path) => {
                info!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TANK_BIND_ADDR") {
            self.server.bind_addr = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: "TANK_BIND_ADDR", value })?;
        }
        if let Some(value) = lookup("PORT") {
            let port = value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidOverride { key: "PORT", value })?;
            self.server.bind_addr.set_port(port);
        }
        if let Some(value) = lookup("TANK_MAX_PLAYERS") {
            self.game.max_players = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: "TANK_MAX_PLAYERS", value })?;
        }
        if let Some(value) = lookup("TANK_TICK_RATE") {
            self.game.tick_rate = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: "TANK_TICK_RATE", value })?;
        }
        if let Some(value) = lookup("TANK_SEED") {
            let seed = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: "TANK_SEED", value })?;
            self.game.seed = Some(seed);
        }
        Ok(())
    }

    /// Check every setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be at least 1".into()));
        }
        self.game.validate()
    }
}

/// Server networking settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
        }
    }
}

/// When a waiting room starts simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartPolicy {
    /// Start once at least `count` players are present.
    MinPlayers {
        /// Required roster size.
        count: usize,
    },
    /// Start once the roster reaches `max_players`.
    FullRoster,
}

impl StartPolicy {
    /// Whether a room with `roster_size` of `max_players` should start.
    pub fn is_satisfied(&self, roster_size: usize, max_players: usize) -> bool {
        match *self {
            StartPolicy::MinPlayers { count } => roster_size >= count.max(1),
            StartPolicy::FullRoster => roster_size >= max_players,
        }
    }
}

impl Default for StartPolicy {
    fn default() -> Self {
        StartPolicy::MinPlayers { count: 1 }
    }
}

/// Room simulation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Map width in cells.
    pub map_width: u32,
    /// Map height in cells.
    pub map_height: u32,
    /// Pixel size of a cell (forwarded to clients, unused by the engine).
    pub tile_size: u32,
    /// Roster capacity.
    pub max_players: usize,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Projectile cells per tick.
    pub bullet_speed: u32,
    /// Health removed per projectile hit.
    pub bullet_damage: i32,
    /// Interior walls requested from the map generator.
    pub random_wall_count: u32,
    /// Score credited to a shooter per kill.
    pub kill_score: u32,
    /// Start policy.
    pub start_policy: StartPolicy,
    /// Base RNG seed; random per room when unset.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map_width: 25,
            map_height: 19,
            tile_size: 32,
            max_players: 4,
            tick_rate: 10,
            bullet_speed: 1,
            bullet_damage: 25,
            random_wall_count: 20,
            kill_score: 1,
            start_policy: StartPolicy::default(),
            seed: None,
        }
    }
}

impl GameConfig {
    /// Smallest map that still has four distinct spawn corners.
    pub const MIN_MAP_SIZE: u32 = 5;

    /// Check the room settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_width < Self::MIN_MAP_SIZE || self.map_height < Self::MIN_MAP_SIZE {
            return Err(ConfigError::Invalid(format!(
                "map must be at least {0}x{0}, got {1}x{2}",
                Self::MIN_MAP_SIZE,
                self.map_width,
                self.map_height
            )));
        }
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ConfigError::Invalid(format!(
                "tick_rate must be within 1..=1000, got {}",
                self.tick_rate
            )));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("max_players must be at least 1".into()));
        }
        if self.bullet_speed == 0 {
            return Err(ConfigError::Invalid("bullet_speed must be at least 1".into()));
        }
        if self.bullet_damage <= 0 {
            return Err(ConfigError::Invalid("bullet_damage must be positive".into()));
        }
        if let StartPolicy::MinPlayers { count } = self.start_policy {
            if count > self.max_players {
                return Err(ConfigError::Invalid(format!(
                    "start_policy count {} exceeds max_players {}",
                    count, self.max_players
                )));
            }
        }
        Ok(())
    }

    /// Tick period in milliseconds.
    pub fn tick_period_ms(&self) -> f64 {
        1000.0 / self.tick_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.game.map_width, 25);
        assert_eq!(config.game.map_height, 19);
        assert_eq!(config.game.tick_period_ms(), 100.0);
        assert_eq!(config.server.bind_addr.port(), 8080);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind_addr = "127.0.0.1:9000"
            max_connections = 10

            [game]
            max_players = 2
            tick_rate = 20

            [game.start_policy]
            kind = "full_roster"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_addr.port(), 9000);
        assert_eq!(config.game.max_players, 2);
        assert_eq!(config.game.tick_rate, 20);
        assert_eq!(config.game.start_policy, StartPolicy::FullRoster);
        // Unspecified fields keep their defaults
        assert_eq!(config.game.bullet_damage, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9100"),
            ("TANK_MAX_PLAYERS", "3"),
            ("TANK_SEED", "77"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_addr.port(), 9100);
        assert_eq!(config.game.max_players, 3);
        assert_eq!(config.game.seed, Some(77));
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "TANK_TICK_RATE").then(|| "fast".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride { key: "TANK_TICK_RATE", .. })
        ));
    }

    #[test]
    fn test_validation() {
        let mut game = GameConfig::default();
        game.map_width = 4;
        assert!(game.validate().is_err());

        let mut game = GameConfig::default();
        game.tick_rate = 0;
        assert!(game.validate().is_err());

        let mut game = GameConfig::default();
        game.bullet_damage = 0;
        assert!(game.validate().is_err());

        // A room that could never reach its start count
        let mut game = GameConfig::default();
        game.max_players = 2;
        game.start_policy = StartPolicy::MinPlayers { count: 3 };
        assert!(game.validate().is_err());
        game.start_policy = StartPolicy::MinPlayers { count: 2 };
        assert!(game.validate().is_ok());
    }

    #[test]
    fn test_start_policy() {
        let policy = StartPolicy::MinPlayers { count: 2 };
        assert!(!policy.is_satisfied(1, 4));
        assert!(policy.is_satisfied(2, 4));

        // A zero count still needs somebody in the room
        let policy = StartPolicy::MinPlayers { count: 0 };
        assert!(!policy.is_satisfied(0, 4));

        assert!(!StartPolicy::FullRoster.is_satisfied(3, 4));
        assert!(StartPolicy::FullRoster.is_satisfied(4, 4));
    }
}
