//! Configuration module for environment variable parsing.
//!
//! The receiver reads everything from environment variables. The provisioner
//! writes these same variables into the service's environment file.

use std::env;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderName;
use thiserror::Error;
use tracing::warn;

/// Header carrying the shared secret unless overridden.
pub const DEFAULT_TOKEN_HEADER: &str = "X-Webhook-Token";

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid HOST value {0:?}")]
    InvalidHost(String),
}

/// Receiver configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind; loopback because nginx sits in front
    pub host: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Shared secret expected in the token header
    pub webhook_token: Option<String>,

    /// Name of the header carrying the shared secret
    pub token_header: String,

    /// Optional key for HMAC-SHA256 body signatures
    pub signing_key: Option<String>,

    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),

            port: parse_or("PORT", lookup("PORT"), 8080),

            webhook_token: lookup("WEBHOOK_TOKEN"),

            token_header: parse_header_name(
                "WEBHOOK_TOKEN_HEADER",
                lookup("WEBHOOK_TOKEN_HEADER"),
            ),

            signing_key: lookup("WEBHOOK_SIGNING_KEY"),

            max_body_bytes: parse_or(
                "WEBHOOK_MAX_BODY_BYTES",
                lookup("WEBHOOK_MAX_BODY_BYTES"),
                DEFAULT_MAX_BODY_BYTES,
            ),
        }
    }

    /// Socket address the receiver binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Accept only a valid HTTP header name, else warn and use the default.
fn parse_header_name(name: &str, raw: Option<String>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_TOKEN_HEADER.to_string();
    };

    let trimmed = raw.trim();
    match HeaderName::from_bytes(trimmed.as_bytes()) {
        Ok(_) => trimmed.to_string(),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid header name, using default");
            DEFAULT_TOKEN_HEADER.to_string()
        }
    }
}

/// Parse a value, falling back to the default on absence or garbage.
fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.webhook_token, None);
        assert_eq!(config.token_header, "X-Webhook-Token");
        assert_eq!(config.signing_key, None);
        assert_eq!(config.max_body_bytes, 1_048_576);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "5000"),
            ("WEBHOOK_TOKEN", "s3cret"),
            ("WEBHOOK_TOKEN_HEADER", "X-Hook-Secret"),
            ("WEBHOOK_MAX_BODY_BYTES", "2048"),
        ]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.webhook_token.as_deref(), Some("s3cret"));
        assert_eq!(config.token_header, "X-Hook-Secret");
        assert_eq!(config.max_body_bytes, 2048);
        assert_eq!(
            config.bind_addr().unwrap(),
            "0.0.0.0:5000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = config_from(&[("PORT", "eighty")]);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_blank_header_name_falls_back() {
        let config = config_from(&[("WEBHOOK_TOKEN_HEADER", "  ")]);
        assert_eq!(config.token_header, DEFAULT_TOKEN_HEADER);
    }

    #[test]
    fn test_invalid_header_name_falls_back() {
        for bad in ["X Hook Token", "X-Hook:Token", "X-Hook\u{e9}"] {
            let config = config_from(&[("WEBHOOK_TOKEN_HEADER", bad)]);
            assert_eq!(config.token_header, DEFAULT_TOKEN_HEADER, "header {bad:?}");
        }

        let config = config_from(&[("WEBHOOK_TOKEN_HEADER", " X-Hook-Secret ")]);
        assert_eq!(config.token_header, "X-Hook-Secret");
    }

    #[test]
    fn test_invalid_host() {
        let config = config_from(&[("HOST", "not a host")]);
        assert!(matches!(
            config.bind_addr(),
            Err(ConfigError::InvalidHost(_))
        ));
    }
}
