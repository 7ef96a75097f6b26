//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::{Tuning, Viewport};
use crate::util::time::DEFAULT_FRAME_RATE;

/// Coordinator configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:4200".to_string()),
        })
    }
}

/// Whether the client plays alone or through the coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientMode {
    Session,
    Solo,
}

impl FromStr for ClientMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "solo" => Ok(Self::Solo),
            _ => Err(ConfigError::Invalid("CLIENT_MODE")),
        }
    }
}

/// How much the autopilot flies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PilotMode {
    /// Steer through every gap
    Fly,
    /// Only the first impulse of a run
    Wake,
    /// Impulses come from control input only
    Off,
}

impl FromStr for PilotMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fly" => Ok(Self::Fly),
            "wake" => Ok(Self::Wake),
            "off" => Ok(Self::Off),
            _ => Err(ConfigError::Invalid("AUTOPILOT")),
        }
    }
}

/// Headless client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub mode: ClientMode,
    pub pilot: PilotMode,
    /// Coordinator WebSocket URL, also the key for the stored high score
    pub coordinator_url: String,
    /// Display name sent on join
    pub player_name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Frames per second the simulation ticks at
    pub frame_rate: u32,
    pub viewport: Viewport,
    /// High score file; `None` uses the per-user data directory
    pub high_score_path: Option<PathBuf>,
    /// Seed for obstacle generation; random when unset
    pub seed: Option<u64>,
    pub tuning: Tuning,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Viewport::default();
        let mut tuning = Tuning::default();
        tuning.gravity = parse_or(&lookup, "GRAVITY", tuning.gravity)?;
        tuning.jump_velocity = parse_or(&lookup, "JUMP_VELOCITY", tuning.jump_velocity)?;

        let player_name = lookup("PLAYER_NAME").unwrap_or_else(|| "bot".to_string());

        Ok(Self {
            mode: parse_or(&lookup, "CLIENT_MODE", ClientMode::Session)?,
            pilot: parse_or(&lookup, "AUTOPILOT", PilotMode::Fly)?,
            coordinator_url: lookup("COORDINATOR_URL")
                .unwrap_or_else(|| "ws://127.0.0.1:3000/ws".to_string()),
            player_name,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            frame_rate: parse_or(&lookup, "FRAME_RATE", DEFAULT_FRAME_RATE)?,
            viewport: Viewport::new(
                parse_or(&lookup, "VIEWPORT_WIDTH", defaults.width)?,
                parse_or(&lookup, "VIEWPORT_HEIGHT", defaults.height)?,
            ),
            high_score_path: lookup("HIGH_SCORE_PATH").map(PathBuf::from),
            seed: lookup("SIM_SEED")
                .map(|s| s.parse().map_err(|_| ConfigError::Invalid("SIM_SEED")))
                .transpose()?,
            tuning,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 3000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn bad_address_is_an_error() {
        let result = ServerConfig::from_lookup(lookup(&[("SERVER_ADDR", "nope")]));
        assert!(matches!(result, Err(ConfigError::InvalidAddress)));
    }

    #[test]
    fn client_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PLAYER_NAME", "Ada"),
            ("FRAME_RATE", "30"),
            ("VIEWPORT_HEIGHT", "900"),
            ("GRAVITY", "0.1"),
            ("SIM_SEED", "12"),
        ]))
        .unwrap();
        assert_eq!(config.player_name, "Ada");
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.viewport.height, 900.0);
        assert_eq!(config.tuning.gravity, 0.1);
        assert_eq!(config.seed, Some(12));
        assert_eq!(config.high_score_path, None);
        assert_eq!(config.mode, ClientMode::Session);
        assert_eq!(config.pilot, PilotMode::Fly);
    }

    #[test]
    fn client_mode_and_pilot_parse() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CLIENT_MODE", "Solo"),
            ("AUTOPILOT", "wake"),
        ]))
        .unwrap();
        assert_eq!(config.mode, ClientMode::Solo);
        assert_eq!(config.pilot, PilotMode::Wake);

        let result = ClientConfig::from_lookup(lookup(&[("CLIENT_MODE", "duel")]));
        assert!(matches!(result, Err(ConfigError::Invalid("CLIENT_MODE"))));
    }

    #[test]
    fn client_rejects_garbage_numbers() {
        let result = ClientConfig::from_lookup(lookup(&[("FRAME_RATE", "fast")]));
        assert!(matches!(result, Err(ConfigError::Invalid("FRAME_RATE"))));
    }
}
