//! Runtime configuration.
//!
//! The server is configured from environment variables:
//!
//! * `COMMISSION_BIND_ADDR` — address to listen on (default `127.0.0.1:3000`).
//! * `COMMISSION_TIER_DIR` — directory of tier ladder JSON files loaded on
//!   top of the built-in templates (default `tiered_configs`).
//! * `COMMISSION_RULES_FILE` — optional JSON array of rules used to seed
//!   the rule store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::CommissionRule;
use crate::tiered::{load_tiered_configs_from_dir, TierCatalog};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_TIER_DIR: &str = "tiered_configs";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub tier_dir: PathBuf,
    pub rules_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            tier_dir: PathBuf::from(DEFAULT_TIER_DIR),
            rules_file: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            bind_addr: lookup("COMMISSION_BIND_ADDR").unwrap_or(defaults.bind_addr),
            tier_dir: lookup("COMMISSION_TIER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tier_dir),
            rules_file: lookup("COMMISSION_RULES_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Built-in templates plus every valid ladder found in `tier_dir`.
    pub fn load_tier_catalog(&self) -> Result<TierCatalog> {
        let mut catalog = TierCatalog::with_defaults();
        let loaded = load_tiered_configs_from_dir(&self.tier_dir)
            .with_context(|| format!("reading tier ladders from {}", self.tier_dir.display()))?;
        for config in loaded {
            let id = config.id.clone();
            catalog.insert(config)?;
            tracing::info!(tiered_config_id = %id, "loaded tier ladder");
        }
        Ok(catalog)
    }

    /// Seed rules from `rules_file`, or none when it is unset.
    pub fn load_seed_rules(&self) -> Result<Vec<CommissionRule>> {
        match &self.rules_file {
            Some(path) => load_rules_from_file(path),
            None => Ok(Vec::new()),
        }
    }
}

/// Parses a JSON array of [`CommissionRule`]s.
pub fn load_rules_from_file(path: &Path) -> Result<Vec<CommissionRule>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading rules from {}", path.display()))?;
    let rules: Vec<CommissionRule> = serde_json::from_str(&data)
        .with_context(|| format!("parsing rules from {}", path.display()))?;
    Ok(rules)
}
