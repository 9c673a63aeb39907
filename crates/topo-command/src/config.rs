//! Manager configuration
//!
//! The configuration is a plain value handed to [`crate::CommandManager::new`].
//! It can be kept next to a session as a RON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use topo_core::TopoConfig;

use crate::error::ConfigError;

/// Where commands run once admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionPolicy {
    /// Long threadable commands go to a worker thread
    #[default]
    Concurrent,
    /// Everything runs on the submitting thread
    Sequential,
}

/// Command manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub policy: ExecutionPolicy,
    /// Commands estimated below this run on the submitting thread
    pub sequential_threshold_ms: u64,
    /// Maximum number of undoable commands, 0 for no limit
    pub undo_depth: usize,
    pub topo: TopoConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            policy: ExecutionPolicy::Concurrent,
            sequential_threshold_ms: 0,
            undo_depth: 0,
            topo: TopoConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn sequential() -> Self {
        Self {
            policy: ExecutionPolicy::Sequential,
            ..Self::default()
        }
    }

    pub fn concurrent() -> Self {
        Self::default()
    }

    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save to a configuration file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = ManagerConfig::from_ron_str("(policy: Sequential, undo_depth: 5)").unwrap();
        assert_eq!(config.policy, ExecutionPolicy::Sequential);
        assert_eq!(config.undo_depth, 5);
        assert_eq!(config.sequential_threshold_ms, 0);
        assert_eq!(config.topo, TopoConfig::default());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manager.ron");
        let mut config = ManagerConfig::sequential();
        config.undo_depth = 12;
        config.topo = TopoConfig::coarse();
        config.save(&path).unwrap();
        assert_eq!(ManagerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(
            ManagerConfig::from_ron_str("(policy: Sometimes)"),
            Err(ConfigError::Deserialize(_))
        ));
        assert!(matches!(
            ManagerConfig::load("/nonexistent/manager.ron"),
            Err(ConfigError::Io(_))
        ));
    }
}
