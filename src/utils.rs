use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use rand::Rng;
use url::Url;

pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Prepends the stun:/turn: scheme to an ICE server URL when it is missing
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
    {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

/// `http(s)://host[:port]/...` → `ws(s)://host[:port]/ws`
pub fn websocket_endpoint(origin: &Url) -> Result<Url, ConfigError> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(ConfigError::Origin(format!("unsupported scheme {other}"))),
    };
    let host = origin
        .host_str()
        .ok_or_else(|| ConfigError::Origin(format!("{origin} has no host")))?;
    let authority = match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Url::parse(&format!("{scheme}://{authority}/ws")).map_err(|e| ConfigError::Origin(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: &str, url: &str) -> ServerConfig {
        ServerConfig {
            id: "s".into(),
            r#type: kind.into(),
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    #[test]
    fn scheme_is_added_only_when_missing() {
        assert_eq!(add_ice_url_scheme(&server("stun", "stun.l.google.com:19302")), "stun:stun.l.google.com:19302");
        assert_eq!(add_ice_url_scheme(&server("turn", "relay:80")), "turn:relay:80");
        assert_eq!(
            add_ice_url_scheme(&server("turn", "turns:relay:443?transport=tcp")),
            "turns:relay:443?transport=tcp"
        );
    }

    #[test]
    fn endpoint_follows_origin_security() {
        let plain = Url::parse("http://127.0.0.1:8000/index.html").unwrap();
        assert_eq!(websocket_endpoint(&plain).unwrap().as_str(), "ws://127.0.0.1:8000/ws");

        let secure = Url::parse("https://example.org").unwrap();
        assert_eq!(websocket_endpoint(&secure).unwrap().as_str(), "wss://example.org/ws");

        let file = Url::parse("file:///tmp/x").unwrap();
        assert!(websocket_endpoint(&file).is_err());
    }

    #[test]
    fn random_ids_are_hex() {
        let id = random_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
