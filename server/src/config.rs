use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use plaza_shared::config::Plane;
use tokio::sync::Semaphore;

use crate::error::ConfigError;

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 8080;

/// Client assets shipped with the crate
pub const DEFAULT_PUBLIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/public");

/// When snapshots go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastPolicy {
    /// One snapshot per accepted update and per disconnect.
    Immediate,
    /// At most one snapshot per tick, only when something changed.
    Tick { hz: u32 },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub public_dir: PathBuf,
    pub broadcast: BroadcastPolicy,
    pub max_connections: usize,
    /// Largest inbound WebSocket message accepted (bytes)
    pub max_message_bytes: usize,
    /// Plane of the default position given to new connections
    pub plane: Plane,
    /// Seed for the id salt. Random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            broadcast: BroadcastPolicy::Immediate,
            max_connections: 1024,
            max_message_bytes: 4096,
            plane: Plane::Xz,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Build from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let port: u16 = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let bind: IpAddr =
            parse_var(&lookup, "PLAZA_BIND")?.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        config.listen_addr = SocketAddr::new(bind, port).to_string();

        if let Some(dir) = lookup("PLAZA_PUBLIC_DIR") {
            config.public_dir = PathBuf::from(dir);
        }
        if let Some(hz) = parse_var::<u32, _>(&lookup, "PLAZA_BROADCAST_HZ")? {
            config.broadcast = match hz {
                0 => BroadcastPolicy::Immediate,
                hz => BroadcastPolicy::Tick { hz },
            };
        }
        if let Some(max) = parse_var(&lookup, "PLAZA_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(max) = parse_var(&lookup, "PLAZA_MAX_MESSAGE_BYTES")? {
            config.max_message_bytes = max;
        }
        if let Some(plane) = parse_var(&lookup, "PLAZA_PLANE")? {
            config.plane = plane;
        }
        config.rng_seed = parse_var(&lookup, "PLAZA_RNG_SEED")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr {:?} is not a socket address",
                self.listen_addr
            )));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be > 0".to_string(),
            ));
        }
        if self.max_connections > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid(format!(
                "max_connections must be <= {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.max_message_bytes < 64 {
            return Err(ConfigError::Invalid(
                "max_message_bytes must be >= 64".to_string(),
            ));
        }
        if let BroadcastPolicy::Tick { hz } = self.broadcast {
            if hz > 1000 {
                return Err(ConfigError::Invalid(
                    "broadcast rate must be <= 1000 Hz".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidVar {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
