//! Engine configuration: a config file, `EVOENGINE_*` environment
//! overrides, and (applied by the caller, last) CLI flags, in that
//! order of increasing precedence. Structure and the config-directory
//! resolution chain are grounded on the original `Config`: JSON on
//! disk at a platform config directory, env vars layered on top at
//! load time.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::population::{RecombinationMode, SortMode};

/// Which role this process starts in, absent an explicit CLI subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Server,
    Client,
    /// Single-process run: serial or thread-pool execution, no networking.
    Run,
}

/// Engine-wide configuration. Every field has a default matching the
/// original engine's documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: Mode,
    pub ip: String,
    pub port: u16,
    pub n_producer_threads: usize,
    pub n_consumer_threads: usize,
    pub pop_size: usize,
    pub n_parents: usize,
    /// 0 = unbounded.
    pub max_generation: u64,
    /// 0 = unbounded.
    pub max_minutes: u64,
    /// Report progress every N generations; 0 disables periodic reporting.
    pub report_generation: u64,
    pub recombine: RecombinationMode,
    pub sort: SortMode,
    pub wait_factor: u32,
    pub max_wait_factor: u32,
    /// Milliseconds. 0 means "wait indefinitely" for the first result of
    /// a generation.
    pub first_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Run,
            ip: "127.0.0.1".to_string(),
            port: 10000,
            n_producer_threads: crate::constants::RANDOM_FACTORY_THREADS,
            n_consumer_threads: 4,
            pop_size: 100,
            n_parents: 5,
            max_generation: 1000,
            max_minutes: 0,
            report_generation: 1,
            recombine: RecombinationMode::Value,
            sort: SortMode::MuPlusNu,
            wait_factor: 2,
            max_wait_factor: 20,
            first_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Config directory: `EVOENGINE_CONFIG_DIR` env override, else the
    /// platform-standard config directory under `evoengine`.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("EVOENGINE_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("could not determine config directory")?
                .join("evoengine")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads the on-disk config (or defaults, if absent) then layers
    /// `EVOENGINE_*` environment overrides on top. CLI flags are applied
    /// by the caller afterward, since `clap` owns which flags the user
    /// actually passed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let path = Self::config_dir()?.join("config.json");
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_dir()?.join("config.json");
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("EVOENGINE_IP") {
            self.ip = v;
        }
        if let Ok(v) = std::env::var("EVOENGINE_PORT") {
            if let Ok(v) = v.parse() {
                self.port = v;
            }
        }
        if let Ok(v) = std::env::var("EVOENGINE_POP_SIZE") {
            if let Ok(v) = v.parse() {
                self.pop_size = v;
            }
        }
        if let Ok(v) = std::env::var("EVOENGINE_N_PARENTS") {
            if let Ok(v) = v.parse() {
                self.n_parents = v;
            }
        }
        if let Ok(v) = std::env::var("EVOENGINE_MAX_GENERATION") {
            if let Ok(v) = v.parse() {
                self.max_generation = v;
            }
        }
        if let Ok(v) = std::env::var("EVOENGINE_MAX_MINUTES") {
            if let Ok(v) = v.parse() {
                self.max_minutes = v;
            }
        }
        if let Ok(v) = std::env::var("EVOENGINE_N_CONSUMER_THREADS") {
            if let Ok(v) = v.parse() {
                self.n_consumer_threads = v;
            }
        }
        if let Ok(v) = std::env::var("EVOENGINE_N_PRODUCER_THREADS") {
            if let Ok(v) = v.parse() {
                self.n_producer_threads = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, Mode::Run);
        assert_eq!(config.pop_size, 100);
        assert_eq!(config.n_parents, 5);
    }

    #[test]
    fn test_env_override_applies_on_top_of_defaults() {
        std::env::set_var("EVOENGINE_POP_SIZE", "250");
        let mut config = EngineConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.pop_size, 250);
        std::env::remove_var("EVOENGINE_POP_SIZE");
    }

    #[test]
    fn test_serialization_round_trips() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pop_size, config.pop_size);
        assert_eq!(back.mode, config.mode);
    }
}
