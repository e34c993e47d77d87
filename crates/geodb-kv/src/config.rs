use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Flush strategy for the commit log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every commit.
    EveryWrite,
    /// Flush to the OS page cache only.
    #[default]
    OsDefault,
}

/// Configuration for [`MemoryEngine::open`](crate::MemoryEngine::open).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the commit log. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub sync_mode: SyncMode,
}

impl EngineConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            sync_mode: SyncMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_in_memory() {
        let c = EngineConfig::default();
        assert!(c.data_dir.is_none());
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c, EngineConfig::in_memory());
    }

    #[test]
    fn persistent_sets_dir() {
        let c = EngineConfig::persistent("/tmp/geo");
        assert_eq!(c.data_dir, Some(PathBuf::from("/tmp/geo")));
    }
}
