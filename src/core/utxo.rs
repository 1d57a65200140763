use crate::core::Block;
use crate::core::transaction::{OutPoint, Transaction, TxOutput};
use crate::crypto::hash::Hashable;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unspent outputs keyed by `(tx hash, output index)`.
///
/// Only [`UtxoSet::apply_block`] and [`UtxoSet::apply_transaction`] mutate
/// it. Neither checks signatures; callers validate first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtxoSet {
    entries: HashMap<OutPoint, TxOutput>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a block into the set. All-or-nothing: if any input is missing
    /// the set is left exactly as it was.
    pub fn apply_block(&mut self, block: &Block) -> Result<()> {
        let mut staged = self.clone();
        for tx in &block.transactions {
            staged.apply_transaction(tx)?;
        }
        *self = staged;
        Ok(())
    }

    /// Removes spent outputs and inserts new ones. On error the set may hold
    /// a partial application; use [`UtxoSet::apply_block`] for atomic updates.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        let tx_hash = tx.hash();

        for input in &tx.inputs {
            if self.entries.remove(&input.previous_output).is_none() {
                return Err(LedgerError::UtxoNotFound(input.previous_output.to_string()));
            }
        }

        for (vout, output) in tx.outputs.iter().enumerate() {
            self.entries.insert(OutPoint::new(tx_hash, vout as u32), output.clone());
        }

        Ok(())
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.entries
            .values()
            .filter(|output| output.address == address)
            .fold(0u64, |acc, output| acc.saturating_add(output.amount))
    }

    pub fn utxos_of(&self, address: &str) -> Vec<(OutPoint, TxOutput)> {
        self.entries
            .iter()
            .filter(|(_, output)| output.address == address)
            .map(|(outpoint, output)| (*outpoint, output.clone()))
            .collect()
    }

    pub fn total_supply(&self) -> u64 {
        self.entries
            .values()
            .fold(0u64, |acc, output| acc.saturating_add(output.amount))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::crypto::hash::Hash256;

    fn coinbase(address: &str, amount: u64, height: u64) -> Transaction {
        Transaction::new_coinbase(
            vec![TxOutput { address: address.to_string(), amount }],
            height,
            "test",
            1,
        )
    }

    #[test]
    fn test_utxo_set_coinbase() -> Result<()> {
        let mut utxo_set = UtxoSet::new();
        let tx = coinbase("mlgalice", 50, 0);

        utxo_set.apply_transaction(&tx)?;

        assert_eq!(utxo_set.balance_of("mlgalice"), 50);
        assert_eq!(utxo_set.balance_of("mlgbob"), 0);
        assert!(utxo_set.contains(&OutPoint::new(tx.hash(), 0)));
        assert_eq!(utxo_set.total_supply(), 50);

        Ok(())
    }

    #[test]
    fn test_utxo_set_spending() -> Result<()> {
        let mut utxo_set = UtxoSet::new();
        let funding = coinbase("mlgalice", 1000, 0);
        utxo_set.apply_transaction(&funding)?;

        let mut spend = Transaction::with_timestamp(2);
        spend.add_input(OutPoint::new(funding.hash(), 0));
        spend.add_output("mlgbob", 600);
        spend.add_output("mlgalice", 400);
        utxo_set.apply_transaction(&spend)?;

        assert!(!utxo_set.contains(&OutPoint::new(funding.hash(), 0)));
        assert_eq!(utxo_set.balance_of("mlgbob"), 600);
        assert_eq!(utxo_set.balance_of("mlgalice"), 400);
        assert_eq!(utxo_set.len(), 2);

        // Spending the same output again must fail
        assert!(matches!(
            utxo_set.apply_transaction(&spend),
            Err(LedgerError::UtxoNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_apply_block_is_atomic() -> Result<()> {
        let mut utxo_set = UtxoSet::new();
        let funding = coinbase("mlgalice", 10, 0);
        utxo_set.apply_transaction(&funding)?;

        let mut bad = Transaction::with_timestamp(3);
        bad.add_input(OutPoint::new(Hash256::hash(b"missing"), 0));
        bad.add_output("mlgbob", 10);

        let block = Block::assemble(
            vec![coinbase("mlgminer", 50, 1), bad],
            Hash256::zero(),
            4,
        );

        assert!(utxo_set.apply_block(&block).is_err());
        assert_eq!(utxo_set.balance_of("mlgminer"), 0);
        assert_eq!(utxo_set.len(), 1);

        Ok(())
    }
}
