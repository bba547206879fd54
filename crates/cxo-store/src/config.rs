use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Flush/sync strategy for the durable backend's commit log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every commit (survives power loss, highest latency).
    EveryCommit,
    /// Flush to the OS after every commit; survives a process crash but not
    /// necessarily a power loss.
    #[default]
    OsDefault,
}

/// Configuration for [`DriveDb`](crate::DriveDb).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Sync strategy applied at commit.
    pub sync_mode: SyncMode,
    /// Rewrite the commit log as a single snapshot record after recovery.
    pub compact_on_open: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            compact_on_open: false,
        }
    }
}

impl DbConfig {
    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = DbConfig::default();
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert!(!c.compact_on_open);
    }

    #[test]
    fn parse_toml() {
        let c = DbConfig::from_toml_str("sync_mode = \"every_commit\"\ncompact_on_open = true\n")
            .unwrap();
        assert_eq!(c.sync_mode, SyncMode::EveryCommit);
        assert!(c.compact_on_open);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(DbConfig::from_toml_str("").unwrap(), DbConfig::default());
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = DbConfig::from_toml_str("sync_mode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
