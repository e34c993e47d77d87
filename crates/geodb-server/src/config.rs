use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use geodb_hub::HubConfig;
use geodb_kv::{EngineConfig, SyncMode};
use geodb_service::GeoDbConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory for the commit log. Unset keeps all data in memory.
    pub data_dir: Option<PathBuf>,
    pub sync_mode: SyncMode,
    /// Seconds between expired-object purges; 0 disables purging.
    pub purge_interval_secs: u64,
    /// Messages buffered per server-sent event connection.
    pub sse_buffer: usize,
    pub hub: HubConfig,
    pub db: GeoDbConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 5678)),
            data_dir: None,
            sync_mode: SyncMode::default(),
            purge_interval_secs: 60,
            sse_buffer: 64,
            hub: HubConfig::default(),
            db: GeoDbConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            data_dir: self.data_dir.clone(),
            sync_mode: self.sync_mode,
        }
    }
}
