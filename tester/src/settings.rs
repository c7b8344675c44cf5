//! Tester-only settings, read from the same YAML file as the fleet settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use coordinator::CoordinatorResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterSettings {
    /// File the router reads messages from, one per line
    pub input_file: PathBuf,
}

impl Default for TesterSettings {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("messages.txt"),
        }
    }
}

impl TesterSettings {
    /// Load from a YAML file; fleet settings in the same file are ignored here
    pub fn load(path: &Path) -> CoordinatorResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }
}
