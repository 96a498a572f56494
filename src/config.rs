//! # Configuration Module
//!
//! Settings for the call bridge: the worker pool, the reply codec, which
//! operation catalog is exposed and where chain definitions come from.
//!
//! ## Features
//! - **Layered Loading**: YAML file, then `.env` and process environment, then hardcoded defaults.
//! - **Partial Configuration**: Missing fields fall back to defaults, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::bridge::catalog::CatalogKind;
use crate::utils::serialization::Codec;

/// Environment variable naming the config file used by the C ABI
pub const CONFIG_PATH_ENV: &str = "ROUTER_BRIDGE_CONFIG";

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "router_bridge.yaml";

// --- Default Value Providers ---

fn d_workers() -> usize {
    2
}
fn d_thread_name() -> String {
    "router-bridge-worker".to_string()
}
fn d_log_level() -> String {
    "INFO".to_string()
}

/// Worker pool executing asynchronous calls.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads of the tokio runtime.
    #[serde(default = "d_workers")]
    pub worker_threads: usize,
    /// Name given to every worker thread.
    #[serde(default = "d_thread_name")]
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: d_workers(),
            thread_name: d_thread_name(),
        }
    }
}

/// The master configuration object of the bridge.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Encoding of reply payloads ("json" or "msgpack").
    #[serde(default)]
    pub codec: Codec,
    /// Operation catalog exposed to the caller ("routing", "swap" or "full").
    #[serde(default)]
    pub catalog: CatalogKind,
    /// Chain definitions replacing the bundled ones.
    #[serde(default)]
    pub chains_file: Option<PathBuf>,
    /// Global logging level ("DEBUG", "INFO", "WARN", "ERROR").
    #[serde(default = "d_log_level")]
    pub log_level: String,
    /// Optional path to the log file. If None, logs to stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            codec: Codec::default(),
            catalog: CatalogKind::default(),
            chains_file: None,
            log_level: d_log_level(),
            log_file: None,
        }
    }
}

impl BridgeConfig {
    /// Loads the configuration from a YAML file and environment variables.
    ///
    /// `.env` is read first. The path defaults to `ROUTER_BRIDGE_CONFIG`, then
    /// to `router_bridge.yaml`. A missing or unreadable file yields defaults.
    /// `LOG_LEVEL`, `BRIDGE_CATALOG` and `BRIDGE_WORKER_THREADS` override the file.
    pub fn from_file(config_path: Option<PathBuf>) -> Self {
        let _ = dotenvy::dotenv();

        let path = config_path
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => Self::from_yaml(&content).unwrap_or_else(|e| {
                    warn!(path = ?path, error = %e, "Invalid bridge config, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Unreadable bridge config, using defaults");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env();
        config
    }

    /// Parses a YAML document, filling missing fields with defaults.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(catalog) = lookup("BRIDGE_CATALOG") {
            match catalog.parse() {
                Ok(kind) => self.catalog = kind,
                Err(_) => warn!(value = %catalog, "Ignoring unknown BRIDGE_CATALOG"),
            }
        }
        if let Some(workers) = lookup("BRIDGE_WORKER_THREADS") {
            match workers.parse::<usize>() {
                Ok(n) if n > 0 => self.runtime.worker_threads = n,
                _ => warn!(value = %workers, "Ignoring invalid BRIDGE_WORKER_THREADS"),
            }
        }
    }

    /// Persists the current configuration to a YAML file.
    pub fn to_file(&self, config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let yaml_content = serde_yaml::to_string(self)?;
        fs::write(config_path, yaml_content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    /// Every test that reads the process environment through `from_file`
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDES: [&str; 3] = ["LOG_LEVEL", "BRIDGE_CATALOG", "BRIDGE_WORKER_THREADS"];

    fn overridden(vars: &[(&str, &str)]) -> BridgeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = BridgeConfig::default();
        config.apply_overrides(|key| vars.get(key).cloned());
        config
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = overridden(&[
            ("LOG_LEVEL", "debug"),
            ("BRIDGE_CATALOG", "Routing"),
            ("BRIDGE_WORKER_THREADS", "8"),
        ]);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.catalog, CatalogKind::Routing);
        assert_eq!(config.runtime.worker_threads, 8);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let config = overridden(&[("BRIDGE_CATALOG", "everything"), ("BRIDGE_WORKER_THREADS", "0")]);
        assert_eq!(config.catalog, CatalogKind::Full);
        assert_eq!(config.runtime.worker_threads, 2);

        let config = overridden(&[("BRIDGE_WORKER_THREADS", "many")]);
        assert_eq!(config.runtime.worker_threads, 2);
    }

    #[test]
    fn environment_overrides_the_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        fs::write(&path, "catalog: swap
log_level: WARN
runtime:
  worker_threads: 3
").unwrap();

        unsafe {
            env::set_var("BRIDGE_CATALOG", "routing");
            env::set_var("BRIDGE_WORKER_THREADS", "0");
            env::remove_var("LOG_LEVEL");
        }
        let loaded = BridgeConfig::from_file(Some(path));
        unsafe {
            for key in OVERRIDES {
                env::remove_var(key);
            }
        }

        assert_eq!(loaded.catalog, CatalogKind::Routing);
        assert_eq!(loaded.runtime.worker_threads, 3);
        assert_eq!(loaded.log_level, "WARN");
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();

        // A directory exists but cannot be read as a file
        let loaded = BridgeConfig::from_file(Some(dir.path().to_path_buf()));
        assert_eq!(loaded.runtime.worker_threads, 2);
        assert_eq!(loaded.catalog, CatalogKind::Full);
    }

    #[test]
    fn empty_document_gives_defaults() {
        let config = BridgeConfig::from_yaml("").unwrap();
        assert_eq!(config.runtime.worker_threads, 2);
        assert_eq!(config.codec, Codec::Json);
        assert_eq!(config.catalog, CatalogKind::Full);
        assert!(config.chains_file.is_none());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = BridgeConfig::from_yaml("codec: msgpack\ncatalog: swap\n").unwrap();
        assert_eq!(config.codec, Codec::Msgpack);
        assert_eq!(config.catalog, CatalogKind::Swap);
        assert_eq!(config.runtime.thread_name, "router-bridge-worker");
        assert_eq!(config.log_level, "INFO");
    }

    #[test]
    fn file_round_trip() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");

        let mut config = BridgeConfig::default();
        config.runtime.worker_threads = 6;
        config.catalog = CatalogKind::Routing;
        config.to_file(path.clone()).unwrap();

        let loaded = BridgeConfig::from_file(Some(path));
        assert_eq!(loaded.runtime.worker_threads, 6);
        assert_eq!(loaded.catalog, CatalogKind::Routing);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        fs::write(&path, "runtime: [not, a, map]").unwrap();

        let loaded = BridgeConfig::from_file(Some(path));
        assert_eq!(loaded.runtime.worker_threads, 2);
    }
}
