/* src/config.rs */

use crate::dispatch::BodyLimits;
use crate::error::ServerError;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Listener and body-accumulation settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: Option<u16>,
    pub max_body_bytes: usize,
    pub body_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = BodyLimits::default();
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            max_body_bytes: limits.max_bytes,
            body_timeout: limits.timeout,
        }
    }
}

impl ServerConfig {
    /// Loads `.env` if present, then reads `BIND_HOST`, `BIND_PORT`,
    /// `MAX_BODY_BYTES` and `BODY_TIMEOUT_SECS` over the defaults.
    pub fn from_env() -> Result<Self, ServerError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("BIND_HOST") {
            config.host = parse("BIND_HOST", &host)?;
        }
        if let Some(port) = lookup("BIND_PORT") {
            config.port = Some(parse_port(&port)?);
        }
        if let Some(max) = lookup("MAX_BODY_BYTES") {
            config.max_body_bytes = parse("MAX_BODY_BYTES", &max)?;
        }
        if let Some(secs) = lookup("BODY_TIMEOUT_SECS") {
            config.body_timeout = Duration::from_secs(parse("BODY_TIMEOUT_SECS", &secs)?);
        }

        Ok(config)
    }

    /// Gets the body limits handed to the dispatcher.
    pub fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            max_bytes: self.max_body_bytes,
            timeout: self.body_timeout,
        }
    }
}

/// Parses a listening port. Only positive integers are valid.
pub fn parse_port(value: &str) -> Result<u16, ServerError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ServerError::InvalidPort(value.to_string())),
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ServerError> {
    value.trim().parse().map_err(|_| ServerError::InvalidConfig {
        key,
        value: value.to_string(),
    })
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
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.body_timeout, Duration::from_secs(30));
        assert!(config.host.is_unspecified());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_HOST", "127.0.0.1"),
            ("BIND_PORT", "9898"),
            ("MAX_BODY_BYTES", "2048"),
            ("BODY_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, Some(9898));
        assert_eq!(config.body_limits().max_bytes, 2048);
        assert_eq!(config.body_limits().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("BIND_PORT", "http")])),
            Err(ServerError::InvalidPort(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("MAX_BODY_BYTES", "-1")])),
            Err(ServerError::InvalidConfig { key: "MAX_BODY_BYTES", .. })
        ));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("8080").unwrap(), 8080);
        assert!(parse_port("0").is_err());
        assert!(parse_port("-5").is_err());
        assert!(parse_port("70000").is_err());
        assert!(parse_port("").is_err());
    }
}
