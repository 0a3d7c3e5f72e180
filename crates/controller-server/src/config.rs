//! Server configuration read from the environment.

use controller_core::{LobbyRules, PlayerColor, UnknownColor};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 4242;

/// Used by the development proxy that serves the controller web app.
pub const RESERVED_DEV_PORT: u16 = 3000;

pub const DEFAULT_PATH: &str = "/controllers";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Port {0} is reserved for the development proxy")]
    ReservedPort(u16),

    #[error("PLAYER_COLORS must name at least one color other than Any")]
    NoColors,

    #[error("MAX_PLAYERS is {max_players} but PLAYER_COLORS only has {colors} colors")]
    NotEnoughColors { max_players: usize, colors: usize },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// The only upgrade path accepted for controllers
    pub controller_path: String,
    pub max_players: usize,
    pub min_players: usize,
    pub colors: Vec<PlayerColor>,
    pub tick: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            controller_path: DEFAULT_PATH.to_string(),
            max_players: 4,
            min_players: 2,
            colors: PlayerColor::ROTATION.to_vec(),
            tick: Duration::from_millis(50),
            handshake_timeout: Duration::from_millis(5000),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CONTROLLER_HOST") {
            config.host = parse("CONTROLLER_HOST", &value)?;
        }
        if let Some(value) = lookup("CONTROLLER_PORT") {
            config.port = parse("CONTROLLER_PORT", &value)?;
        }
        if config.port == RESERVED_DEV_PORT {
            return Err(ConfigError::ReservedPort(config.port));
        }

        if let Some(value) = lookup("CONTROLLER_PATH") {
            if !value.starts_with('/') {
                return Err(invalid("CONTROLLER_PATH", &value, "must start with '/'"));
            }
            config.controller_path = value;
        }

        if let Some(value) = lookup("PLAYER_COLORS") {
            config.colors = parse_colors(&value)?;
        }

        // Every player needs a color of their own
        match lookup("MAX_PLAYERS") {
            Some(value) => {
                config.max_players = parse("MAX_PLAYERS", &value)?;
                if config.max_players == 0 {
                    return Err(invalid("MAX_PLAYERS", &value, "must be at least 1"));
                }
                if config.max_players > config.colors.len() {
                    return Err(ConfigError::NotEnoughColors {
                        max_players: config.max_players,
                        colors: config.colors.len(),
                    });
                }
            }
            None => config.max_players = config.max_players.min(config.colors.len()),
        }
        if let Some(value) = lookup("MIN_PLAYERS") {
            config.min_players = parse("MIN_PLAYERS", &value)?;
        }
        config.min_players = config.min_players.min(config.max_players);

        if let Some(value) = lookup("TICK_MS") {
            config.tick = Duration::from_millis(parse("TICK_MS", &value)?);
            if config.tick.is_zero() {
                return Err(invalid("TICK_MS", &value, "must be positive"));
            }
        }
        if let Some(value) = lookup("HANDSHAKE_TIMEOUT_MS") {
            config.handshake_timeout =
                Duration::from_millis(parse("HANDSHAKE_TIMEOUT_MS", &value)?);
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn lobby_rules(&self) -> LobbyRules {
        LobbyRules::new(self.min_players)
    }

    /// Whether `path` addresses the controller endpoint. A trailing `/` is
    /// tolerated.
    pub fn is_controller_path(&self, path: &str) -> bool {
        let expected = self.controller_path.trim_end_matches('/');
        let path = path.trim_end_matches('/');
        path == expected
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_colors(value: &str) -> Result<Vec<PlayerColor>, ConfigError> {
    let mut colors = Vec::new();
    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
        let color: PlayerColor = part.parse().map_err(|e: UnknownColor| {
            invalid("PLAYER_COLORS", value, &e.to_string())
        })?;
        if color.is_any() {
            return Err(invalid(
                "PLAYER_COLORS",
                value,
                "Any cannot be part of the rotation",
            ));
        }
        if colors.contains(&color) {
            return Err(invalid("PLAYER_COLORS", value, "colors must not repeat"));
        }
        colors.push(color);
    }

    if colors.is_empty() {
        return Err(ConfigError::NoColors);
    }
    Ok(colors)
}
