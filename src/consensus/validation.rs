use crate::core::{Block, UtxoSet};
use crate::crypto::hash::{Hash256, Hashable};
use crate::mining::DifficultyTarget;
use crate::{LedgerError, Result};
use std::collections::HashSet;

/// Consensus rules a block must satisfy before it may touch the UTXO set.
#[derive(Debug, Clone)]
pub struct BlockValidator {
    target: DifficultyTarget,
    mining_reward: u64,
}

impl BlockValidator {
    pub fn new(target: DifficultyTarget, mining_reward: u64) -> Self {
        Self {
            target,
            mining_reward,
        }
    }

    pub fn target(&self) -> &DifficultyTarget {
        &self.target
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    /// Validates a block extending `tip` at `height` and returns the UTXO set
    /// as it would be after applying it. `utxo_set` itself is not modified.
    pub fn validate_block(
        &self,
        block: &Block,
        tip: &Hash256,
        height: u64,
        utxo_set: &UtxoSet,
    ) -> Result<UtxoSet> {
        log::debug!("Validating block {} at height {}", block.hash, height);

        self.validate_block_structure(block)?;

        if block.previous_hash != *tip {
            return Err(LedgerError::StaleBlock {
                expected: tip.to_hex(),
                found: block.previous_hash.to_hex(),
            });
        }

        self.validate_header(block)?;
        self.validate_coinbase(block, height)?;

        let staged = self.validate_block_transactions(block, utxo_set)?;

        log::debug!("✅ Block {} validation successful", height);
        Ok(staged)
    }

    /// The genesis block has no parent and no reward cap; its coinbase is the
    /// initial issuance.
    pub fn validate_genesis(&self, block: &Block) -> Result<UtxoSet> {
        self.validate_block_structure(block)?;

        if block.previous_hash != Hash256::zero() {
            return Err(LedgerError::InvalidBlock("Genesis must not have a parent".to_string()));
        }

        self.validate_header(block)?;
        self.validate_block_transactions(block, &UtxoSet::new())
    }

    fn validate_block_structure(&self, block: &Block) -> Result<()> {
        if block.transactions.is_empty() {
            return Err(LedgerError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        if !block.transactions[0].is_coinbase() {
            return Err(LedgerError::InvalidCoinbase(
                "First transaction must be coinbase".to_string(),
            ));
        }

        for (i, tx) in block.transactions.iter().enumerate().skip(1) {
            if tx.is_coinbase() {
                return Err(LedgerError::InvalidCoinbase(format!(
                    "Non-first transaction {} is coinbase",
                    i
                )));
            }
        }

        Ok(())
    }

    fn validate_header(&self, block: &Block) -> Result<()> {
        if block.hash != block.compute_hash() {
            return Err(LedgerError::HashMismatch);
        }

        if !block.meets_difficulty(&self.target) {
            return Err(LedgerError::InvalidProofOfWork);
        }

        if block.merkle_root != Block::calculate_merkle_root(&block.transactions)
            || !block.merkle_tree_matches()
        {
            return Err(LedgerError::MerkleRootMismatch);
        }

        Ok(())
    }

    fn validate_coinbase(&self, block: &Block, height: u64) -> Result<()> {
        let coinbase = &block.transactions[0];

        if coinbase.coinbase_height() != Some(height) {
            return Err(LedgerError::InvalidCoinbase(format!(
                "Coinbase does not commit to height {}",
                height
            )));
        }

        let value = coinbase.total_output_value()?;
        if value != self.mining_reward {
            return Err(LedgerError::InvalidCoinbase(format!(
                "Coinbase pays {}, reward is {}",
                value, self.mining_reward
            )));
        }

        Ok(())
    }

    /// Validates transactions in block order, each against the UTXO view left
    /// by the ones before it, so a second spend of the same output inside one
    /// block is caught.
    fn validate_block_transactions(&self, block: &Block, utxo_set: &UtxoSet) -> Result<UtxoSet> {
        let mut seen_txids = HashSet::new();
        let mut staged = utxo_set.clone();

        for tx in &block.transactions {
            let txid = tx.hash();
            if !seen_txids.insert(txid) {
                return Err(LedgerError::DuplicateTransaction(txid.to_hex()));
            }

            tx.validate(&staged)?;
            staged.apply_transaction(tx)?;
        }

        Ok(staged)
    }

    /// Structural check of a stored chain. Block 0 is trusted as given; every
    /// later block must hash to its stored hash, link to its parent, meet the
    /// difficulty target and commit to its own transactions.
    pub fn validate_chain(&self, blocks: &[Block]) -> Result<()> {
        log::debug!("Validating chain of {} blocks", blocks.len());

        for (height, pair) in blocks.windows(2).enumerate() {
            let (previous, block) = (&pair[0], &pair[1]);
            let height = height + 1;

            let integrity = |reason: &str| LedgerError::ChainIntegrity {
                height,
                reason: reason.to_string(),
            };

            if block.hash != block.compute_hash() {
                return Err(integrity("stored hash does not match header fields"));
            }

            if block.previous_hash != previous.hash {
                return Err(integrity("previous hash does not link to parent"));
            }

            if !block.meets_difficulty(&self.target) {
                return Err(integrity("hash does not meet difficulty target"));
            }

            if block.merkle_root != Block::calculate_merkle_root(&block.transactions) {
                return Err(integrity("merkle root does not match transactions"));
            }

            if !block.merkle_tree_matches() {
                return Err(integrity("stored merkle tree does not match merkle root"));
            }
        }

        Ok(())
    }
}
