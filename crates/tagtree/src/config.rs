// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! Supports both programmatic and file-based configuration:
//!
//! ```toml
//! machines = ["http://10.0.0.1:4001", "http://10.0.0.2:4001"]
//! namespace = "/app"
//! ttl = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Store endpoints (`http://host:port`).
    #[serde(default = "default_machines")]
    pub machines: Vec<String>,

    /// Base path prepended to every tag (`""` = store root).
    #[serde(default)]
    pub namespace: String,

    /// TTL in seconds applied to every write (0 = no expiry).
    #[serde(default)]
    pub ttl: u64,
}

fn default_machines() -> Vec<String> {
    vec!["http://127.0.0.1:4001".to_string()]
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            machines: default_machines(),
            namespace: String::new(),
            ttl: 0,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machines.is_empty() {
            return Err(ConfigError::Invalid("No machines configured".into()));
        }

        for machine in &self.machines {
            let rest = machine
                .strip_prefix("http://")
                .or_else(|| machine.strip_prefix("https://"));
            match rest {
                Some(host) if !host.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "Machine {:?} is not an http(s) URL",
                        machine
                    )))
                }
            }
        }

        if !self.namespace.is_empty() {
            if !self.namespace.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "Namespace {:?} must start with '/'",
                    self.namespace
                )));
            }
            if self.namespace.ends_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "Namespace {:?} must not end with '/'",
                    self.namespace
                )));
            }
        }

        Ok(())
    }
}

/// Config builder for fluent API
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    machines: Option<Vec<String>>,
    namespace: Option<String>,
    ttl: Option<u64>,
}

impl ClientConfigBuilder {
    /// Replace the endpoint list
    pub fn machines<I, M>(mut self, machines: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.machines = Some(machines.into_iter().map(Into::into).collect());
        self
    }

    /// Add one endpoint
    pub fn machine(mut self, machine: impl Into<String>) -> Self {
        self.machines.get_or_insert_with(Vec::new).push(machine.into());
        self
    }

    /// Set the path prefix
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set TTL in seconds (0 = no expiry)
    pub fn ttl(mut self, secs: u64) -> Self {
        self.ttl = Some(secs);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();

        ClientConfig {
            machines: self.machines.unwrap_or(defaults.machines),
            namespace: self.namespace.unwrap_or(defaults.namespace),
            ttl: self.ttl.unwrap_or(defaults.ttl),
        }
    }
}
