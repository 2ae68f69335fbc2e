// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration for the corvid CLI.
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. `<config dir>/corvid/config.toml`
//! 3. `./corvid.toml`
//! 4. `CORVID_*` environment variables (`CORVID_STACK_CAPACITY=4096`)
//! 5. command-line flags

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use corvid_vm::vm::DEFAULT_STACK_CAPACITY;

/// Project-local configuration file.
pub const LOCAL_CONFIG: &str = "corvid.toml";

/// Prefix of configuration environment variables.
const ENV_PREFIX: &str = "CORVID_";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum stack slots for a run
    pub stack_capacity: usize,

    /// Address the debug server binds and `attach` connects to
    pub debug_addr: String,

    /// Suspend before the first instruction when debugging
    pub suspend_on_start: bool,

    /// `tracing` filter directives; `RUST_LOG` takes precedence
    pub log_filter: Option<String>,

    /// Lines of console history to keep
    pub history_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            debug_addr: "127.0.0.1:7878".to_string(),
            suspend_on_start: false,
            log_filter: None,
            history_size: 1000,
        }
    }
}

impl Config {
    /// Loads configuration from the default locations.
    ///
    /// `explicit` replaces the project-local file when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = user_config_path() {
            if path.exists() {
                config.merge_file(&path)?;
            }
        }

        match explicit {
            Some(path) => config.merge_file(path)?,
            None => {
                let local = PathBuf::from(LOCAL_CONFIG);
                if local.exists() {
                    config.merge_file(&local)?;
                }
            }
        }

        config.load_from_env(std::env::vars());
        Ok(config)
    }

    /// Merges the keys present in a TOML file.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        self.merge_toml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Merges the keys present in TOML text.
    pub fn merge_toml(&mut self, text: &str) -> Result<()> {
        let table: toml::Table = text.parse()?;
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            self.set(&key, &value)?;
        }
        Ok(())
    }

    /// Applies `CORVID_*` variables; invalid values are logged and skipped.
    pub fn load_from_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            let Some(key) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_lowercase();
            if let Err(e) = self.set(&key, &value) {
                warn!(key = %key, error = %e, "ignoring environment setting");
            }
        }
    }

    /// Sets one value by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "stack_capacity" => {
                let capacity: usize = value
                    .parse()
                    .with_context(|| format!("stack_capacity must be a number, got '{}'", value))?;
                if capacity == 0 {
                    bail!("stack_capacity must be positive");
                }
                self.stack_capacity = capacity;
            }
            "debug_addr" => self.debug_addr = value.to_string(),
            "suspend_on_start" => {
                self.suspend_on_start = value
                    .parse()
                    .with_context(|| format!("suspend_on_start must be true or false, got '{}'", value))?;
            }
            "log_filter" => self.log_filter = Some(value.to_string()),
            "history_size" => {
                self.history_size = value
                    .parse()
                    .with_context(|| format!("history_size must be a number, got '{}'", value))?;
            }
            _ => bail!("unknown configuration key '{}'", key),
        }
        Ok(())
    }
}

/// Per-user configuration file.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("corvid").join("config.toml"))
}

/// Console history file.
pub fn history_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("corvid")
        .join("console_history")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.stack_capacity, DEFAULT_STACK_CAPACITY);
        assert!(!config.suspend_on_start);
        assert_eq!(config.log_filter, None);
    }

    #[test]
    fn test_merge_toml_overrides_present_keys_only() {
        let mut config = Config::default();
        config
            .merge_toml("stack_capacity = 4096\nsuspend_on_start = true\n")
            .unwrap();
        assert_eq!(config.stack_capacity, 4096);
        assert!(config.suspend_on_start);
        assert_eq!(config.debug_addr, Config::default().debug_addr);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        assert!(config.merge_toml("stack_capacity = 0").is_err());
        assert!(config.merge_toml("colour = \"blue\"").is_err());
        assert!(config.set("history_size", "lots").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_environment_layer() {
        let mut config = Config::default();
        config.load_from_env([
            ("CORVID_DEBUG_ADDR".to_string(), "0.0.0.0:9000".to_string()),
            ("CORVID_STACK_CAPACITY".to_string(), "nope".to_string()),
            ("PATH".to_string(), "/bin".to_string()),
        ]);
        assert_eq!(config.debug_addr, "0.0.0.0:9000");
        assert_eq!(config.stack_capacity, DEFAULT_STACK_CAPACITY);
    }

    #[test]
    fn test_merge_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCAL_CONFIG);
        std::fs::write(&path, "log_filter = \"corvid=trace\"\nhistory_size = 10\n").unwrap();

        let mut config = Config::default();
        config.merge_file(&path).unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("corvid=trace"));
        assert_eq!(config.history_size, 10);

        let err = config.merge_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }
}
