use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "server_config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid listen host {host:?}: {source}")]
    BadHost {
        host: String,
        source: std::net::AddrParseError,
    },
}

/// Listen address, read from `server_config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 3030,
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|source| ConfigError::BadHost {
            host: self.host.clone(),
            source,
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let config: ServerConfig = toml::from_str("host = \"0.0.0.0\"\nport = 8080\n").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3030);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = toml::from_str::<ServerConfig>("port = \"not a number\"").unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn unparseable_host_is_rejected() {
        let config = ServerConfig {
            host: "chat.example.com".to_owned(),
            port: 3030,
        };
        assert!(matches!(
            config.socket_addr(),
            Err(ConfigError::BadHost { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ServerConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
