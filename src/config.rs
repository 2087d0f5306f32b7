// Configuration management module
// This file handles loading and parsing of runtime settings from
// environment variables or a YAML file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use alloy_primitives::{Address, B256};

use crate::router::execution::EngineConfig;
use crate::router::gas::GasConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint, e.g. https://mainnet.base.org
    pub rpc_endpoint: Url,
    /// Router contract address (0x...)
    pub router_address: String,
    /// Account the engine executes for (0x...)
    pub account_address: String,
    pub chain_id: u64,
    /// Bound on receipt waits in seconds (default 120)
    pub confirmation_timeout_secs: Option<u64>,
    /// Gas buffer percentage (default 20)
    pub gas_buffer_percent: Option<u64>,
    pub gas_floor: Option<u64>,
    pub gas_ceiling: Option<u64>,
    /// Block explorer base for transaction links (optional)
    pub explorer_base: Option<Url>,
}

impl AppConfig {
    /// Load from environment variables with `__` separators
    /// (e.g. `APP__RPC_ENDPOINT`).
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Load from a YAML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("parse YAML config")
    }

    pub fn router(&self) -> Result<Address> {
        Address::from_str(&self.router_address)
            .with_context(|| format!("invalid router address: {}", self.router_address))
    }

    pub fn account(&self) -> Result<Address> {
        Address::from_str(&self.account_address)
            .with_context(|| format!("invalid account address: {}", self.account_address))
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut gas = GasConfig::default();
        if let Some(buffer) = self.gas_buffer_percent {
            gas.buffer_percent = buffer;
        }
        if let Some(floor) = self.gas_floor {
            gas.floor = floor;
        }
        if let Some(ceiling) = self.gas_ceiling {
            gas.ceiling = ceiling;
        }
        let mut cfg = EngineConfig::new(self.router()?, self.account()?, self.chain_id);
        if let Some(secs) = self.confirmation_timeout_secs {
            cfg.confirmation_timeout = Duration::from_secs(secs);
        }
        cfg.gas = gas;
        Ok(cfg)
    }

    /// Explorer link for a transaction hash, when an explorer is configured.
    pub fn explorer_tx_url(&self, hash: B256) -> Option<Url> {
        let base = self.explorer_base.as_ref()?;
        base.join(&format!("tx/{hash}")).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
rpc_endpoint: "https://mainnet.base.org"
router_address: "0x6fF5693b99212Da76ad316178A184AB56D299b43"
account_address: "0x000000000000000000000000000000000000dEaD"
chain_id: 8453
confirmation_timeout_secs: 90
gas_buffer_percent: 25
explorer_base: "https://basescan.org/"
"#;

    #[test]
    fn yaml_config_builds_engine_config() {
        let cfg = AppConfig::from_yaml(YAML).unwrap();
        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.chain_id, 8453);
        assert_eq!(engine.confirmation_timeout, Duration::from_secs(90));
        assert_eq!(engine.gas.buffer_percent, 25);
        assert_eq!(engine.gas.floor, 100_000);
    }

    #[test]
    fn bad_address_is_rejected_with_context() {
        let cfg = AppConfig::from_yaml(&YAML.replace(
            "0x6fF5693b99212Da76ad316178A184AB56D299b43",
            "not-an-address",
        ))
        .unwrap();
        assert!(cfg.router().is_err());
    }

    #[test]
    fn explorer_link_joins_hash() {
        let cfg = AppConfig::from_yaml(YAML).unwrap();
        let url = cfg.explorer_tx_url(B256::repeat_byte(0xAB)).unwrap();
        assert!(url.as_str().starts_with("https://basescan.org/tx/0xabab"));
    }
}
