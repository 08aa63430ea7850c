//! Engine configuration.
//!
//! A [`Store`] owns the compiler configuration and the engine built from it.
//! Every module compiled through a store shares its engine; instances get
//! their own engine-side state when they are created.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use wasmtime::{Config, Engine};

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimization {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

/// Compiler and engine settings, loadable from JSON.
///
/// ```json
/// { "optimization": "speed_and_size", "debug_info": false, "max_wasm_stack": 1048576 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub optimization: Optimization,
    pub debug_info: bool,
    pub parallel_compilation: bool,
    /// Maximum guest stack in bytes; engine default when unset.
    pub max_wasm_stack: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            optimization: Optimization::default(),
            debug_info: false,
            parallel_compilation: true,
            max_wasm_stack: None,
        }
    }
}

impl StoreConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn to_engine_config(&self) -> Config {
        let mut config = Config::new();
        config.cranelift_opt_level(match self.optimization {
            Optimization::None => wasmtime::OptLevel::None,
            Optimization::Speed => wasmtime::OptLevel::Speed,
            Optimization::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });
        config.debug_info(self.debug_info);
        config.parallel_compilation(self.parallel_compilation);
        if let Some(size) = self.max_wasm_stack {
            config.max_wasm_stack(size);
        }
        config
    }
}

/// Holds the engine modules are compiled with.
#[derive(Clone)]
pub struct Store {
    engine: Engine,
    config: StoreConfig,
}

impl Store {
    /// A store with the default configuration.
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
            config: StoreConfig::default(),
        }
    }

    pub fn with_config(config: StoreConfig) -> Result<Self, ConfigError> {
        let engine = Engine::new(&config.to_engine_config())
            .map_err(|e| ConfigError::Engine(e.to_string()))?;
        tracing::debug!(?config, "created engine");
        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
