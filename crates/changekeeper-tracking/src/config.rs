//! Tracking configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// Configuration for a [`ChangesetManager`](crate::ChangesetManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Initial state of the global capture flag
    pub tracking_enabled: bool,
    /// Maximum number of changesets kept; the oldest are pruned beyond it
    pub max_changesets: Option<usize>,
    /// Whether `run_transaction` drops transactions that recorded nothing
    pub discard_empty_transactions: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            max_changesets: None,
            discard_empty_transactions: true,
        }
    }
}

impl TrackingConfig {
    /// Set the history cap
    pub fn with_max_changesets(mut self, max: usize) -> Self {
        self.max_changesets = Some(max);
        self
    }

    /// Set the initial capture flag
    pub fn with_tracking_enabled(mut self, enabled: bool) -> Self {
        self.tracking_enabled = enabled;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: TrackingConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_changesets == Some(0) {
            return Err(TrackingError::config("max_changesets must be at least 1"));
        }
        Ok(())
    }
}
