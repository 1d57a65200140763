use crate::core::{Block, Blockchain, Transaction, UtxoSet};
use crate::crypto::hash::Hash256;
use crate::mining::CancellationToken;
use crate::Result;
use std::sync::{Arc, RwLock};

/// Thread-safe handle to a [`Blockchain`].
///
/// Readers share the lock and always see a whole number of blocks applied.
/// Mining happens outside the lock; the append re-checks the tip under the
/// write lock, so of two candidates built on the same tip only one lands.
#[derive(Debug, Clone)]
pub struct SharedBlockchain {
    inner: Arc<RwLock<Blockchain>>,
}

impl SharedBlockchain {
    pub fn new(chain: Blockchain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Runs `f` under the read lock.
    pub fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Blockchain) -> R,
    {
        let chain = self.inner.read()?;
        Ok(f(&chain))
    }

    pub fn balance_of(&self, address: &str) -> Result<u64> {
        self.read(|chain| chain.balance_of(address))
    }

    pub fn total_supply(&self) -> Result<u64> {
        self.read(|chain| chain.total_supply())
    }

    pub fn height(&self) -> Result<u64> {
        self.read(|chain| chain.height())
    }

    pub fn tip(&self) -> Result<Hash256> {
        self.read(|chain| chain.tip())
    }

    pub fn utxo_snapshot(&self) -> Result<UtxoSet> {
        self.read(|chain| chain.utxo_set().clone())
    }

    pub fn is_chain_valid(&self) -> Result<bool> {
        self.read(|chain| chain.is_chain_valid())
    }

    pub fn submit_block(&self, block: Block) -> Result<()> {
        let mut chain = self.inner.write()?;
        chain.add_block(block)
    }

    /// Builds a candidate under the read lock, mines it with no lock held and
    /// appends it. Fails with `StaleBlock` if another block landed meanwhile.
    pub fn mine_next_block(
        &self,
        pending: Vec<Transaction>,
        miner_address: &str,
        cancel: &CancellationToken,
    ) -> Result<Hash256> {
        let (mut block, target, miner) = {
            let chain = self.inner.read()?;
            (
                chain.prepare_block(pending, miner_address)?,
                chain.difficulty(),
                chain.miner().clone(),
            )
        };

        miner.mine(&mut block, &target, cancel)?;

        let hash = block.hash;
        self.submit_block(block)?;
        Ok(hash)
    }

    pub async fn mine_next_block_async(
        &self,
        pending: Vec<Transaction>,
        miner_address: &str,
        cancel: CancellationToken,
    ) -> Result<Hash256> {
        let (block, target, miner) = {
            let chain = self.inner.read()?;
            (
                chain.prepare_block(pending, miner_address)?,
                chain.difficulty(),
                chain.miner().clone(),
            )
        };

        let (block, _) = miner.mine_async(block, target, cancel).await?;

        let hash = block.hash;
        self.submit_block(block)?;
        Ok(hash)
    }
}
