//! Router configuration: blocklist and feature flags.
//!
//! Loaded from a JSON file and injected as a reloadable snapshot. Reloads
//! are an atomic swap of the whole configuration; dispatch in progress keeps
//! the snapshot it started with and never observes a partial mutation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Feature toggles consulted by the command router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Send a simulated-typing presence toggle for plain-text messages
    pub simulated_typing: bool,
    /// Mark inbound plain-text messages as read
    pub read_receipts: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            simulated_typing: false,
            read_receipts: false,
        }
    }
}

/// Configuration for the command router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Sender identifiers whose messages are dropped silently
    pub blocklist: HashSet<String>,
    /// Feature toggles for message side effects
    pub features: FeatureFlags,
    /// Prefix marking a message as a command (default `"."`)
    pub command_prefix: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            blocklist: HashSet::new(),
            features: FeatureFlags::default(),
            command_prefix: ".".to_string(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: RouterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.command_prefix.is_empty() {
            return Err(crate::Error::Config(
                "command_prefix must not be empty".to_string(),
            ));
        }
        if self.command_prefix.chars().any(|c| c.is_whitespace()) {
            return Err(crate::Error::Config(
                "command_prefix must not contain whitespace".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cloneable handle to the current router configuration.
///
/// `snapshot` hands out the `Arc` currently installed; `reload` swaps the
/// whole `Arc`, so readers either see the old configuration or the new one,
/// never a mix.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<RouterConfig>>>,
}

impl ConfigHandle {
    /// Create a handle holding the given configuration.
    pub fn new(config: RouterConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The currently installed configuration snapshot.
    pub fn snapshot(&self) -> Arc<RouterConfig> {
        Arc::clone(&self.inner.read().unwrap())
    }

    /// Atomically install a new configuration.
    pub fn reload(&self, config: RouterConfig) {
        *self.inner.write().unwrap() = Arc::new(config);
    }

    /// Reload from a JSON file; the previous configuration stays installed
    /// if loading or validation fails.
    pub fn reload_from_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let config = RouterConfig::from_file(path)?;
        self.reload(config);
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
