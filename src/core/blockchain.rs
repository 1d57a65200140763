use crate::config::{GenesisConfig, LedgerConfig};
use crate::consensus::validation::BlockValidator;
use crate::core::transaction::{now_millis, OutPoint, TransactionBuilder, TxOutput};
use crate::core::utxo::UtxoSet;
use crate::core::{Block, BlockHeader, Transaction};
use crate::crypto::hash::Hash256;
use crate::crypto::keys::{is_valid_address, PrivateKey};
use crate::mining::{CancellationToken, DifficultyTarget, Miner};
use crate::{LedgerError, Result};

/// Ordered blocks plus the UTXO set they fold into. All chain state changes
/// go through [`Blockchain::add_block`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    utxo_set: UtxoSet,
    validator: BlockValidator,
    miner: Miner,
    issued: u64,
}

impl Blockchain {
    /// Mines the genesis block described by `config` and starts a chain on it.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let target = DifficultyTarget::new(config.consensus.difficulty)?;
        let validator = BlockValidator::new(target, config.consensus.mining_reward);
        let miner = Miner::new(config.mining.threads);

        let mut genesis = Self::create_genesis_block(&config.genesis)?;
        miner.mine(&mut genesis, &target, &CancellationToken::new())?;

        let utxo_set = validator.validate_genesis(&genesis)?;

        log::info!(
            "🌱 Genesis block {} created ({}, reward {})",
            genesis.hash,
            target,
            config.consensus.mining_reward
        );

        Ok(Self {
            blocks: vec![genesis],
            utxo_set,
            validator,
            miner,
            issued: config.genesis_supply().ok_or(LedgerError::ValueOverflow)?,
        })
    }

    /// Unmined genesis block whose coinbase pays the configured allocations.
    pub fn create_genesis_block(genesis: &GenesisConfig) -> Result<Block> {
        let mut outputs = Vec::with_capacity(genesis.allocations.len());
        let mut supply = 0u64;
        for allocation in &genesis.allocations {
            if !is_valid_address(&allocation.address) {
                return Err(LedgerError::InvalidAddress(allocation.address.clone()));
            }
            supply = supply
                .checked_add(allocation.amount)
                .ok_or(LedgerError::ValueOverflow)?;
            outputs.push(TxOutput {
                address: allocation.address.clone(),
                amount: allocation.amount,
            });
        }

        let timestamp = now_millis();
        let coinbase = Transaction::new_coinbase(outputs, 0, &genesis.message, timestamp);

        Ok(Block::assemble(vec![coinbase], Hash256::zero(), timestamp))
    }

    /// Validates `block` against the current tip and UTXO set and appends it.
    /// On any error the chain is unchanged.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let height = self.blocks.len() as u64;

        let staged = self
            .validator
            .validate_block(&block, &self.tip(), height, &self.utxo_set)
            .map_err(|e| {
                log::warn!("❌ Rejected block {} at height {}: {}", block.hash, height, e);
                e
            })?;

        self.utxo_set = staged;
        self.issued = self.issued.saturating_add(self.validator.mining_reward());

        log::info!(
            "✅ Block {} added at height {} ({} transactions)",
            block.hash,
            height,
            block.transaction_count()
        );
        self.blocks.push(block);

        Ok(())
    }

    /// Unmined candidate for the next height: a coinbase paying the mining
    /// reward to `miner_address`, then `pending` in order. Pending
    /// transactions are checked against the current UTXO set first so a
    /// doomed candidate is never mined.
    pub fn prepare_block(&self, pending: Vec<Transaction>, miner_address: &str) -> Result<Block> {
        if !is_valid_address(miner_address) {
            return Err(LedgerError::InvalidAddress(miner_address.to_string()));
        }

        let mut staged = self.utxo_set.clone();
        for tx in &pending {
            if tx.is_coinbase() {
                return Err(LedgerError::InvalidCoinbase(
                    "Pending transactions must not be coinbase".to_string(),
                ));
            }
            tx.validate(&staged)?;
            staged.apply_transaction(tx)?;
        }

        let height = self.blocks.len() as u64;
        let timestamp = now_millis();
        let coinbase = Transaction::new_coinbase(
            vec![TxOutput {
                address: miner_address.to_string(),
                amount: self.validator.mining_reward(),
            }],
            height,
            "block reward",
            timestamp,
        );

        let mut transactions = Vec::with_capacity(pending.len() + 1);
        transactions.push(coinbase);
        transactions.extend(pending);

        Ok(Block::assemble(transactions, self.tip(), timestamp))
    }

    pub fn mine_next_block(&mut self, pending: Vec<Transaction>, miner_address: &str) -> Result<&Block> {
        self.mine_next_block_with(pending, miner_address, &CancellationToken::new())
    }

    /// [`Blockchain::mine_next_block`] with an external stop signal. A
    /// cancelled search leaves the chain untouched.
    pub fn mine_next_block_with(
        &mut self,
        pending: Vec<Transaction>,
        miner_address: &str,
        cancel: &CancellationToken,
    ) -> Result<&Block> {
        let mut block = self.prepare_block(pending, miner_address)?;
        let target = *self.validator.target();
        self.miner.mine(&mut block, &target, cancel)?;
        self.add_block(block)?;

        self.blocks
            .last()
            .ok_or_else(|| LedgerError::InvalidBlock("Chain has no blocks".to_string()))
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.utxo_set.balance_of(address)
    }

    pub fn utxos_of(&self, address: &str) -> Vec<(OutPoint, TxOutput)> {
        self.utxo_set.utxos_of(address)
    }

    /// Signed payment of `amount` from `from` to `to`, with change back to
    /// `from`. Not added to the chain.
    pub fn build_transaction(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        private_key: &PrivateKey,
    ) -> Result<Transaction> {
        if !is_valid_address(to) {
            return Err(LedgerError::InvalidAddress(to.to_string()));
        }

        TransactionBuilder::new(&self.utxo_set)
            .add_output(to, amount)
            .build(from, private_key)
    }

    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Chain validation failed: {}", e);
                false
            }
        }
    }

    pub fn validate_chain(&self) -> Result<()> {
        self.validator.validate_chain(&self.blocks)
    }

    /// Height of the tip; the genesis block is height 0.
    pub fn height(&self) -> u64 {
        self.blocks.len().saturating_sub(1) as u64
    }

    pub fn tip(&self) -> Hash256 {
        self.blocks.last().map(|block| block.hash).unwrap_or_else(Hash256::zero)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    pub fn headers(&self) -> Vec<BlockHeader> {
        self.blocks.iter().map(Block::header).collect()
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    /// Sum of all unspent outputs.
    pub fn total_supply(&self) -> u64 {
        self.utxo_set.total_supply()
    }

    /// Genesis allocations plus one mining reward per later block. Equal to
    /// [`Blockchain::total_supply`] on any chain built through `add_block`.
    pub fn issued_supply(&self) -> u64 {
        self.issued
    }

    pub fn difficulty(&self) -> DifficultyTarget {
        *self.validator.target()
    }

    pub fn mining_reward(&self) -> u64 {
        self.validator.mining_reward()
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::Hashable;
    use crate::crypto::keys::KeyPair;

    fn config(difficulty: u32) -> LedgerConfig {
        LedgerConfig::default().with_difficulty(difficulty).with_threads(2)
    }

    #[test]
    fn test_genesis_block() -> Result<()> {
        let alice = KeyPair::new()?;
        let chain = Blockchain::new(&config(2).with_allocation(&alice.address(), 100))?;

        assert_eq!(chain.height(), 0);
        assert_eq!(chain.blocks().len(), 1);
        assert!(chain.tip().to_hex().starts_with("00"));
        assert_eq!(chain.block(0).map(|b| b.previous_hash), Some(Hash256::zero()));
        assert_eq!(chain.balance_of(&alice.address()), 100);
        assert_eq!(chain.issued_supply(), 100);
        assert!(chain.is_chain_valid());
        Ok(())
    }

    #[test]
    fn test_genesis_rejects_invalid_allocation() {
        let result = Blockchain::new(&config(0).with_allocation("not-an-address", 10));
        assert!(matches!(result, Err(LedgerError::InvalidAddress(_))));
    }

    #[test]
    fn test_genesis_rejects_overflowing_allocations() -> Result<()> {
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;
        let config = config(0)
            .with_allocation(&alice.address(), u64::MAX - 1)
            .with_allocation(&bob.address(), 5);

        assert_eq!(config.genesis_supply(), None);
        assert!(matches!(
            Blockchain::create_genesis_block(&config.genesis),
            Err(LedgerError::ValueOverflow)
        ));
        assert!(matches!(Blockchain::new(&config), Err(LedgerError::ValueOverflow)));
        Ok(())
    }

    #[test]
    fn test_two_blocks_with_payments() -> Result<()> {
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;
        let carol = KeyPair::new()?;
        let miner = KeyPair::new()?;

        let mut chain = Blockchain::new(&config(2).with_allocation(&alice.address(), 100))?;

        let tx = chain.build_transaction(&alice.address(), &bob.address(), 30, &alice.private_key)?;
        chain.mine_next_block(vec![tx], &miner.address())?;

        let tx = chain.build_transaction(&bob.address(), &carol.address(), 10, &bob.private_key)?;
        chain.mine_next_block(vec![tx], &miner.address())?;

        assert_eq!(chain.height(), 2);
        assert!(chain.is_chain_valid());
        for block in chain.blocks() {
            assert!(block.hash.to_hex().starts_with("00"));
            assert!(block.is_consistent());
        }

        assert_eq!(chain.balance_of(&alice.address()), 70);
        assert_eq!(chain.balance_of(&bob.address()), 20);
        assert_eq!(chain.balance_of(&carol.address()), 10);
        assert_eq!(chain.balance_of(&miner.address()), 100);
        Ok(())
    }

    #[test]
    fn test_payment_with_change() -> Result<()> {
        let alice = KeyPair::new()?;
        let charlie = KeyPair::new()?;
        let miner = KeyPair::new()?;

        let mut chain = Blockchain::new(&config(1))?;
        chain.mine_next_block(Vec::new(), &alice.address())?;
        assert_eq!(chain.balance_of(&alice.address()), 50);

        let tx = chain.build_transaction(&alice.address(), &charlie.address(), 30, &alice.private_key)?;
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].address, charlie.address());
        assert_eq!(tx.outputs[0].amount, 30);
        assert_eq!(tx.outputs[1].address, alice.address());
        assert_eq!(tx.outputs[1].amount, 20);

        chain.mine_next_block(vec![tx], &miner.address())?;

        assert_eq!(chain.balance_of(&alice.address()), 20);
        assert_eq!(chain.balance_of(&charlie.address()), 30);
        Ok(())
    }

    #[test]
    fn test_supply_is_conserved() -> Result<()> {
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;

        let mut chain = Blockchain::new(&config(1).with_allocation(&alice.address(), 75))?;
        assert_eq!(chain.total_supply(), chain.issued_supply());

        for amount in [10, 20, 5] {
            let tx = chain.build_transaction(&alice.address(), &bob.address(), amount, &alice.private_key)?;
            chain.mine_next_block(vec![tx], &bob.address())?;
            assert_eq!(chain.total_supply(), chain.issued_supply());
        }

        assert_eq!(chain.issued_supply(), 75 + 3 * 50);
        assert_eq!(chain.balance_of(&alice.address()) + chain.balance_of(&bob.address()), 225);
        Ok(())
    }

    #[test]
    fn test_double_spend_across_blocks() -> Result<()> {
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;
        let carol = KeyPair::new()?;

        let mut chain = Blockchain::new(&config(1).with_allocation(&alice.address(), 50))?;

        let first = chain.build_transaction(&alice.address(), &bob.address(), 30, &alice.private_key)?;
        let second = chain.build_transaction(&alice.address(), &carol.address(), 30, &alice.private_key)?;
        assert_eq!(first.inputs[0].previous_output, second.inputs[0].previous_output);

        chain.mine_next_block(vec![first], &bob.address())?;
        let tip = chain.tip();

        let result = chain.mine_next_block(vec![second], &bob.address());
        assert!(matches!(result, Err(LedgerError::UtxoNotFound(_))));

        assert_eq!(chain.height(), 1);
        assert_eq!(chain.tip(), tip);
        assert_eq!(chain.balance_of(&carol.address()), 0);
        Ok(())
    }

    #[test]
    fn test_double_spend_within_block() -> Result<()> {
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;
        let carol = KeyPair::new()?;

        let mut chain = Blockchain::new(&config(1).with_allocation(&alice.address(), 50))?;
        let snapshot = chain.utxo_set().clone();

        let first = chain.build_transaction(&alice.address(), &bob.address(), 30, &alice.private_key)?;
        let second = chain.build_transaction(&alice.address(), &carol.address(), 30, &alice.private_key)?;

        // The candidate builder refuses it outright
        let result = chain.prepare_block(vec![first.clone(), second.clone()], &bob.address());
        assert!(matches!(result, Err(LedgerError::UtxoNotFound(_))));

        // A hand-built block reaches the validator and is rejected there
        let coinbase = Transaction::new_coinbase(
            vec![TxOutput { address: bob.address(), amount: 50 }],
            1,
            "block reward",
            now_millis(),
        );
        let mut block = Block::assemble(vec![coinbase, first, second], chain.tip(), now_millis());
        block.mine(&chain.difficulty());

        let result = chain.add_block(block);
        assert!(matches!(result, Err(LedgerError::UtxoNotFound(_))));

        assert_eq!(chain.height(), 0);
        assert_eq!(chain.utxo_set().len(), snapshot.len());
        assert_eq!(chain.balance_of(&alice.address()), 50);
        assert_eq!(chain.balance_of(&bob.address()), 0);
        Ok(())
    }

    #[test]
    fn test_rejects_stale_candidate() -> Result<()> {
        let miner = KeyPair::new()?;
        let mut chain = Blockchain::new(&config(1))?;

        let mut first = chain.prepare_block(Vec::new(), &miner.address())?;
        let mut second = chain.prepare_block(Vec::new(), &miner.address())?;
        first.mine(&chain.difficulty());
        second.mine(&chain.difficulty());

        chain.add_block(first)?;
        let result = chain.add_block(second);

        assert!(matches!(result, Err(LedgerError::StaleBlock { .. })));
        assert_eq!(chain.height(), 1);
        Ok(())
    }

    #[test]
    fn test_rejects_inflated_reward() -> Result<()> {
        let miner = KeyPair::new()?;
        let mut chain = Blockchain::new(&config(1))?;

        let mut block = chain.prepare_block(Vec::new(), &miner.address())?;
        block.transactions[0].outputs[0].amount = 5_000;
        let block = {
            let mut rebuilt = Block::assemble(block.transactions, block.previous_hash, block.timestamp);
            rebuilt.mine(&chain.difficulty());
            rebuilt
        };

        let result = chain.add_block(block);
        assert!(matches!(result, Err(LedgerError::InvalidCoinbase(_))));
        assert_eq!(chain.total_supply(), 0);
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_miner_address() -> Result<()> {
        let mut chain = Blockchain::new(&config(0))?;
        let result = chain.mine_next_block(Vec::new(), "nobody");

        assert!(matches!(result, Err(LedgerError::InvalidAddress(_))));
        assert_eq!(chain.height(), 0);
        Ok(())
    }

    #[test]
    fn test_cancelled_mining_leaves_chain() -> Result<()> {
        let miner = KeyPair::new()?;
        let mut chain = Blockchain::new(&config(1))?;

        let token = CancellationToken::new();
        token.cancel();

        let result = chain.mine_next_block_with(Vec::new(), &miner.address(), &token);
        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(chain.height(), 0);
        Ok(())
    }

    #[test]
    fn test_proof_of_work_per_difficulty() -> Result<()> {
        let miner = KeyPair::new()?;

        for difficulty in 0..=3 {
            let mut chain = Blockchain::new(&config(difficulty))?;
            let block = chain.mine_next_block(Vec::new(), &miner.address())?;

            let prefix = "0".repeat(difficulty as usize);
            assert!(block.hash.to_hex().starts_with(&prefix));
            assert_eq!(block.hash, block.compute_hash());
        }
        Ok(())
    }

    fn three_block_chain() -> Result<(Blockchain, KeyPair)> {
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;

        let mut chain = Blockchain::new(&config(1).with_allocation(&alice.address(), 100))?;
        let tx = chain.build_transaction(&alice.address(), &bob.address(), 40, &alice.private_key)?;
        chain.mine_next_block(vec![tx], &bob.address())?;
        chain.mine_next_block(Vec::new(), &bob.address())?;

        assert_eq!(chain.height(), 2);
        assert!(chain.is_chain_valid());
        Ok((chain, alice))
    }

    #[test]
    fn test_tampered_amount_detected() -> Result<()> {
        let (mut chain, _) = three_block_chain()?;

        chain.blocks[1].transactions[1].outputs[0].amount = 1_000_000;

        assert!(!chain.is_chain_valid());
        assert!(matches!(
            chain.validate_chain(),
            Err(LedgerError::ChainIntegrity { height: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_tampered_nonce_detected() -> Result<()> {
        let (mut chain, _) = three_block_chain()?;

        chain.blocks[1].nonce += 1;

        assert!(matches!(
            chain.validate_chain(),
            Err(LedgerError::ChainIntegrity { height: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_remined_tamper_breaks_linkage() -> Result<()> {
        let (mut chain, _) = three_block_chain()?;
        let target = chain.difficulty();

        let block = &mut chain.blocks[1];
        block.transactions[1].outputs[0].amount = 1_000_000;
        block.refresh_merkle_root();
        block.set_nonce(0);
        block.mine(&target);
        assert!(block.is_consistent());

        assert!(matches!(
            chain.validate_chain(),
            Err(LedgerError::ChainIntegrity { height: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_headers_match_blocks() -> Result<()> {
        let (chain, _) = three_block_chain()?;
        let headers = chain.headers();

        assert_eq!(headers.len(), 3);
        for (header, block) in headers.iter().zip(chain.blocks()) {
            assert_eq!(header.hash, block.hash);
            assert_eq!(header.merkle_root, block.merkle_root);
        }
        assert_eq!(chain.blocks()[1].hash(), headers[1].hash);
        Ok(())
    }
}
