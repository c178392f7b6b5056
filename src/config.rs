//! Configuration module

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::features::DEFAULT_MODEL_WIDTH;

pub const DEFAULT_MODEL_NAME: &str = "seattle_energy_svr:latest";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Root of the artifact store
    pub artifact_dir: PathBuf,

    /// Model identifier, `name[:tag]`
    pub model_name: String,

    /// Number of scaled columns the model was trained on
    pub model_width: usize,

    /// Log a summary of each assembled feature vector
    pub log_features: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            artifact_dir: PathBuf::from("artifacts"),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_width: DEFAULT_MODEL_WIDTH,
            log_features: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: get("BIND_HOST")
                .and_then(|h| h.parse().ok())
                .unwrap_or(defaults.host),

            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            artifact_dir: get("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),

            model_name: get("MODEL_NAME").unwrap_or(defaults.model_name),

            model_width: get("MODEL_WIDTH")
                .and_then(|w| w.parse().ok())
                .filter(|w| *w > 0)
                .unwrap_or(defaults.model_width),

            log_features: get("LOG_PRED").as_deref() == Some("1"),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
