use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    pub consensus: ConsensusConfig,
    pub mining: MiningConfig,
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusConfig {
    pub difficulty: u32, // leading zero hex digits
    pub mining_reward: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiningConfig {
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenesisConfig {
    pub message: String,
    /// Outputs of the genesis coinbase. The genesis block is the only place
    /// value is issued outside the per-block reward.
    pub allocations: Vec<GenesisAllocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenesisAllocation {
    pub address: String,
    pub amount: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusConfig {
                difficulty: 2,
                mining_reward: 50,
            },
            mining: MiningConfig {
                threads: num_cpus::get(),
            },
            genesis: GenesisConfig {
                message: "Merkle Ledger Genesis".to_string(),
                allocations: Vec::new(),
            },
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.consensus.difficulty = difficulty;
        self
    }

    pub fn with_mining_reward(mut self, mining_reward: u64) -> Self {
        self.consensus.mining_reward = mining_reward;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.mining.threads = threads;
        self
    }

    pub fn with_allocation(mut self, address: &str, amount: u64) -> Self {
        self.genesis.allocations.push(GenesisAllocation {
            address: address.to_string(),
            amount,
        });
        self
    }

    /// Total genesis issuance, `None` if the allocations overflow a u64.
    pub fn genesis_supply(&self) -> Option<u64> {
        self.genesis
            .allocations
            .iter()
            .try_fold(0u64, |acc, allocation| acc.checked_add(allocation.amount))
    }

    /// Reads the config at `$HOME/.merkle-ledger/config.json`, writing the
    /// defaults there first if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        let home_dir = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".merkle-ledger").join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();

        assert_eq!(config.consensus.difficulty, 2);
        assert_eq!(config.consensus.mining_reward, 50);
        assert!(config.mining.threads >= 1);
        assert_eq!(config.genesis_supply(), Some(0));
    }

    #[test]
    fn test_save_and_load_roundtrip() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("config.json");

        let config = LedgerConfig::default()
            .with_difficulty(3)
            .with_threads(2)
            .with_allocation("mlgalice", 100);
        config.save_to(&path)?;

        let loaded = LedgerConfig::load_from(&path)?;
        assert_eq!(loaded, config);
        assert_eq!(loaded.genesis_supply(), Some(100));
        Ok(())
    }

    #[test]
    fn test_load_rejects_malformed_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json")?;

        assert!(LedgerConfig::load_from(&path).is_err());
        Ok(())
    }
}
