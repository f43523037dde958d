use crate::{env_or_default, env_parse, ConfigError, EnvSource, FromEnv};
use std::net::Ipv4Addr;

/// Listen address for HTTP services
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromEnv for ServerConfig {
    /// Reads `HOST` (default 0.0.0.0) and `PORT` (default 8080)
    fn from_source(source: &dyn EnvSource) -> Result<Self, ConfigError> {
        let host = env_or_default(source, "HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_parse(source, "PORT", 8080u16)?;

        Ok(Self { host, port })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED.to_string(), 8080)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_server_config_defaults() {
        let vars: HashMap<&'static str, &'static str> = HashMap::new();
        let config = ServerConfig::from_source(&vars).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_server_config_custom_values() {
        let vars: HashMap<&'static str, &'static str> =
            [("HOST", "127.0.0.1"), ("PORT", "3000")].into_iter().collect();
        let config = ServerConfig::from_source(&vars).unwrap();
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_server_config_invalid_port() {
        for port in ["not_a_number", "99999"] {
            let vars: HashMap<&'static str, &'static str> = [("PORT", port)].into_iter().collect();
            let err = ServerConfig::from_source(&vars).unwrap_err();
            assert!(err.to_string().contains("PORT"));
        }
    }
}
