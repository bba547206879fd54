use cxo_refs::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ContainerError, ContainerResult};

/// Container settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Items per Refs tree node. Must be the same for every writer of a
    /// store, since it decides the digests of stored trees.
    pub refs_degree: usize,
    /// Collect garbage in the same transaction as every publish.
    pub gc_on_publish: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            refs_degree: Engine::DEFAULT_DEGREE,
            gc_on_publish: false,
        }
    }
}

impl ContainerConfig {
    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ContainerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ContainerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ContainerResult<()> {
        if self.refs_degree < 2 {
            return Err(ContainerError::Config(format!(
                "refs_degree must be at least 2, got {}",
                self.refs_degree
            )));
        }
        Ok(())
    }
}
