//! Configuration for the synchronization layer

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Timestep must be finite and positive, got {0}")]
    InvalidTimestep(f32),
    #[error("Substep cap must be at least 1, got {0}")]
    InvalidSubstepCap(u32),
    #[error("Cache eviction interval must be at least 1 frame")]
    InvalidEvictionInterval,
    #[error("Physics speed must be finite and non-negative, got {0}")]
    InvalidPhysicsSpeed(f32),
    #[error("Invalid meshing strategy: {0}")]
    InvalidStrategy(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for stepping, caching and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fixed simulation timestep in seconds
    pub timestep: f32,
    /// Maximum substeps per frame; time beyond the cap is dropped
    pub max_substeps: u32,
    /// Dead mesh cache entries are purged every this many frames
    pub eviction_interval_frames: u32,
    /// Multiplier applied to wall-clock time; 0 pauses the simulation
    pub physics_speed: f32,
    /// Overrides the default `tracing` filter when set
    pub log_filter: Option<String>,
}

impl SyncConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = ?path, "Loading sync config");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(ConfigError::InvalidTimestep(self.timestep));
        }
        if self.max_substeps == 0 {
            return Err(ConfigError::InvalidSubstepCap(self.max_substeps));
        }
        if self.eviction_interval_frames == 0 {
            return Err(ConfigError::InvalidEvictionInterval);
        }
        if !self.physics_speed.is_finite() || self.physics_speed < 0.0 {
            return Err(ConfigError::InvalidPhysicsSpeed(self.physics_speed));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            max_substeps: 4,
            eviction_interval_frames: 60,
            physics_speed: 1.0,
            log_filter: None,
        }
    }
}
