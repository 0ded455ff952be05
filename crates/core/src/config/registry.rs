//! Configuration registry for loading configs at runtime.
//!
//! Expected structure:
//! ```text
//! config/
//!   engine.toml          (optional)
//!   chains/
//!     ethereum.toml
//!     bsc.toml
//! ```

use super::{ChainConfig, EngineConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Loaded engine and chain configurations.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    /// Engine tuning (defaults when `engine.toml` is absent)
    engine: EngineConfig,
    /// Chain configurations indexed by chain ID
    chains: HashMap<u64, ChainConfig>,
    /// Chain configurations indexed by config file name (e.g., "ethereum")
    chains_by_name: HashMap<String, u64>,
}

impl ConfigRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all configurations from a directory.
    pub fn load_from_dir(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        info!(config_dir = %config_dir.display(), "Loading configuration registry");

        let mut registry = Self::new();

        let engine_path = config_dir.join("engine.toml");
        if engine_path.exists() {
            registry.engine = EngineConfig::from_file(&engine_path)
                .with_context(|| format!("loading {}", engine_path.display()))?;
        }

        let chains_dir = config_dir.join("chains");
        if chains_dir.exists() {
            registry.load_chains(&chains_dir)?;
        }

        info!(
            profile = %registry.engine.profile,
            chains = registry.chains.len(),
            "Configuration registry loaded"
        );

        Ok(registry)
    }

    /// Load chain configs from a directory.
    fn load_chains(&mut self, dir: &Path) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|e| e == "toml") {
                // Get file stem (name without extension) for name-based lookup
                let file_name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("unknown")
                    .to_string();

                match ChainConfig::from_file(&path) {
                    Ok(config) => {
                        let chain_id = config.chain.chain_id;
                        debug!(
                            chain_id = chain_id,
                            name = %config.chain.name,
                            file = %path.display(),
                            "Loaded chain config"
                        );
                        self.chains.insert(chain_id, config);
                        self.chains_by_name.insert(file_name, chain_id);
                    }
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Failed to load chain config"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Get chain config by chain ID.
    pub fn get_chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    /// Get chain config by name (file stem).
    pub fn get_chain_by_name(&self, name: &str) -> Option<&ChainConfig> {
        self.chains_by_name
            .get(name)
            .and_then(|id| self.chains.get(id))
    }

    /// Resolve a chain by file name or numeric chain id.
    pub fn resolve_chain(&self, selector: &str) -> Option<&ChainConfig> {
        self.get_chain_by_name(selector).or_else(|| {
            selector
                .parse::<u64>()
                .ok()
                .and_then(|id| self.get_chain(id))
        })
    }

    /// Get all chain IDs.
    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chains.keys().copied()
    }
}

/// Load the registry from `BOXKEEPER_CONFIG` (default `./config`) and pick
/// the chain named by `BOXKEEPER_CHAIN` (default `ethereum`).
pub fn load_from_env() -> Result<(EngineConfig, ChainConfig)> {
    let config_dir = std::env::var("BOXKEEPER_CONFIG").unwrap_or_else(|_| "./config".to_string());
    let selector = std::env::var("BOXKEEPER_CHAIN").unwrap_or_else(|_| "ethereum".to_string());

    let registry = ConfigRegistry::load_from_dir(&config_dir)?;
    let chain = registry
        .resolve_chain(&selector)
        .cloned()
        .with_context(|| format!("no chain config for {:?} in {}", selector, config_dir))?;

    Ok((registry.engine().clone(), chain))
}
