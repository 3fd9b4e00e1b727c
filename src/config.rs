// Application configuration
// Logging can only be switched off in development builds

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use crate::utils::websocket_endpoint;
use url::Url;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // debug builds log

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // release builds stay quiet

#[cfg(debug_assertions)]
pub mod dev {
    // Flip to false to silence logging entirely in a debug build.
    // Only honoured in debug mode!
    pub const ENABLE_LOGGING: bool = true;
    // Per-candidate dumps and SDP sizes.
    pub const VERBOSE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    // Fixed in release builds
    pub const VERBOSE_LOGGING: bool = false;
    pub const ENABLE_LOGGING: bool = false;
}

/// Origin the signaling endpoint is derived from when nothing is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

pub const ORIGIN_ENV: &str = "PEERCALL_ORIGIN";
pub const ICE_SERVERS_ENV: &str = "PEERCALL_ICE_SERVERS";

/// Runtime configuration of a call client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Page/app origin; the relay lives at `ws(s)://<host>/ws` on it.
    pub origin: Url,
    /// Static STUN/TURN list handed to every new peer connection.
    pub ice_servers: Vec<ServerConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL"),
            ice_servers: default_ice_servers(),
        }
    }
}

impl ClientConfig {
    pub fn new(origin: &str, ice_servers: Vec<ServerConfig>) -> Result<Self, ConfigError> {
        let origin = Url::parse(origin).map_err(|e| ConfigError::Origin(e.to_string()))?;
        validate_ice_servers(&ice_servers)?;
        Ok(Self {
            origin,
            ice_servers,
        })
    }

    /// Reads `PEERCALL_ORIGIN` and `PEERCALL_ICE_SERVERS` (a JSON array), falling back
    /// to the defaults for whatever is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let origin = lookup(ORIGIN_ENV).unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let ice_servers = match lookup(ICE_SERVERS_ENV) {
            Some(raw) => serde_json::from_str(&raw)?,
            None => default_ice_servers(),
        };
        Self::new(&origin, ice_servers)
    }

    pub fn signaling_endpoint(&self) -> Result<Url, ConfigError> {
        websocket_endpoint(&self.origin)
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            id: "default-stun".into(),
            r#type: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "metered-stun".into(),
            r#type: "stun".into(),
            url: "stun:stun.relay.metered.ca:80".into(),
            username: None,
            credential: None,
        },
    ]
}

pub fn validate_ice_servers(servers: &[ServerConfig]) -> Result<(), ConfigError> {
    for server in servers {
        if server.url.is_empty() {
            return Err(ConfigError::IceServer(format!(
                "server {} has an empty URL",
                server.id
            )));
        }

        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
            return Err(ConfigError::IceServer(format!(
                "TURN server {} requires username and credential",
                server.id
            )));
        }
    }
    Ok(())
}
