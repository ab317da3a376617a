use crate::error::{LedgerError, Result};
use crate::types::{parse_btc, BlockHeight};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Seal a block after every successful transaction
    pub automine: bool,
    pub genesis_height: BlockHeight,
    pub faucet: FaucetPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetPolicy {
    pub enabled: bool,
    pub max_per_request: Amount,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            automine: true,
            genesis_height: 0,
            faucet: FaucetPolicy {
                enabled: true,
                max_per_request: Amount::from_sat(100 * 100_000_000), // 100 BTC
            },
        }
    }
}

impl ChainConfig {
    /// Manual block production, no faucet
    pub fn manual() -> Self {
        let mut config = Self::default();
        config.automine = false;
        config.faucet.enabled = false;
        config
    }

    pub fn with_faucet_limit(mut self, limit: &str) -> Result<Self> {
        self.faucet.max_per_request = parse_btc(limit)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.faucet.enabled && self.faucet.max_per_request == Amount::ZERO {
            return Err(LedgerError::config(
                "Faucet limit must be greater than 0 when the faucet is enabled",
            ));
        }

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ChainConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.automine);
    }

    #[test]
    fn test_zero_faucet_limit_rejected() {
        let config = ChainConfig::default().with_faucet_limit("0").unwrap();
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));

        let mut manual = ChainConfig::manual();
        manual.faucet.max_per_request = Amount::ZERO;
        assert!(manual.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert_eq!(
            ChainConfig::load_or_default(&path).unwrap(),
            ChainConfig::default()
        );

        let config = ChainConfig::manual();
        config.save(&path).unwrap();
        assert_eq!(ChainConfig::load(&path).unwrap(), config);
    }
}
