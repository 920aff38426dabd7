use std::net::SocketAddr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_bind(std::env::var("PROFILEX_BIND").ok().as_deref())
    }

    fn from_bind(bind: Option<&str>) -> anyhow::Result<Self> {
        let bind = bind.map(str::trim).filter(|b| !b.is_empty()).unwrap_or(DEFAULT_BIND);
        let bind = bind
            .parse()
            .with_context(|| format!("PROFILEX_BIND is not a socket address: {bind}"))?;
        Ok(Self { bind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind() {
        let config = ServerConfig::from_bind(None).unwrap();
        assert_eq!(config.bind, ServerConfig::default().bind);
    }

    #[test]
    fn test_custom_bind() {
        let config = ServerConfig::from_bind(Some("0.0.0.0:9090")).unwrap();
        assert_eq!(config.bind.port(), 9090);
    }

    #[test]
    fn test_invalid_bind() {
        assert!(ServerConfig::from_bind(Some("localhost")).is_err());
    }
}
