//! Optional `echo.toml` configuration for an echo memory directory.
//!
//! A missing file means defaults; a malformed one is an error.

use crate::core::error::EchoError;
use crate::core::store::Store;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EchoConfig {
    pub session: SessionConfig,
    pub signals: SignalConfig,
    pub summary: SummaryConfig,
}

/// Labels written into each session's metadata record.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub context: String,
    pub agent_version: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context: "EchoCopi Framework Session".to_string(),
            agent_version: "Generic AI Agent".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SignalConfig {
    pub enabled: bool,
    /// Relative paths resolve against the store root.
    pub file: PathBuf,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: PathBuf::from("echo_state/logs/signals.jsonl"),
        }
    }
}

/// Window sizes for the continuity summary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    pub patterns: usize,
    pub components: usize,
    pub milestones: usize,
    pub understanding_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            patterns: 5,
            components: 5,
            milestones: 3,
            understanding_chars: 100,
        }
    }
}

pub fn load_config(store: &Store) -> Result<EchoConfig, EchoError> {
    let path = store.config_path();
    if !path.exists() {
        return Ok(EchoConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: EchoConfig = toml::from_str(&content)?;
    Ok(config)
}

impl SignalConfig {
    pub fn resolved_file(&self, store: &Store) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            store.root.join(&self.file)
        }
    }
}
