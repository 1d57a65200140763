use crate::core::encoding::CanonicalEncoder;
use crate::core::utxo::UtxoSet;
use crate::crypto::hash::{Hash256, Hashable};
use crate::crypto::signatures::Signature;
use crate::crypto::keys::{PublicKey, PrivateKey};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;

pub const TRANSACTION_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub timestamp: u64, // milliseconds since the Unix epoch
    /// Opaque bytes committed by the hash. Coinbase transactions keep the
    /// block height and a message here.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub signature: Option<InputSignature>,
}

/// Signature over one input together with the key that produced it. The
/// public key is what ties the signature to an address-keyed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignature {
    pub signature: Signature,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Sum of `amounts`, or [`LedgerError::ValueOverflow`] if it does not fit a u64.
pub fn checked_total(amounts: impl IntoIterator<Item = u64>) -> Result<u64> {
    amounts
        .into_iter()
        .try_fold(0u64, |acc, amount| acc.checked_add(amount))
        .ok_or(LedgerError::ValueOverflow)
}

impl Transaction {
    pub fn new() -> Self {
        Self::with_timestamp(now_millis())
    }

    pub fn with_timestamp(timestamp: u64) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            timestamp,
            payload: Vec::new(),
        }
    }

    /// Zero-input transaction issuing `outputs`. The height goes into the
    /// payload so coinbases of different blocks never share a hash.
    pub fn new_coinbase(outputs: Vec<TxOutput>, height: u64, message: &str, timestamp: u64) -> Self {
        let mut payload = Vec::with_capacity(8 + message.len());
        payload.extend_from_slice(&height.to_le_bytes());
        payload.extend_from_slice(message.as_bytes());

        Self {
            version: TRANSACTION_VERSION,
            inputs: Vec::new(),
            outputs,
            timestamp,
            payload,
        }
    }

    pub fn add_input(&mut self, outpoint: OutPoint) {
        self.inputs.push(TxInput {
            previous_output: outpoint,
            signature: None,
        });
    }

    pub fn add_output(&mut self, address: &str, amount: u64) {
        self.outputs.push(TxOutput {
            address: address.to_string(),
            amount,
        });
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Height recorded in a coinbase payload.
    pub fn coinbase_height(&self) -> Option<u64> {
        if !self.is_coinbase() || self.payload.len() < 8 {
            return None;
        }
        let mut height = [0u8; 8];
        height.copy_from_slice(&self.payload[..8]);
        Some(u64::from_le_bytes(height))
    }

    pub fn total_output_value(&self) -> Result<u64> {
        checked_total(self.outputs.iter().map(|output| output.amount))
    }

    pub fn total_input_value(&self, utxo_set: &UtxoSet) -> Result<u64> {
        let mut total = 0u64;
        for input in &self.inputs {
            let output = utxo_set
                .get(&input.previous_output)
                .ok_or_else(|| LedgerError::UtxoNotFound(input.previous_output.to_string()))?;
            total = total.checked_add(output.amount).ok_or(LedgerError::ValueOverflow)?;
        }
        Ok(total)
    }

    pub fn size(&self) -> usize {
        bincode::serialized_size(self).map(|size| size as usize).unwrap_or(0)
    }

    pub fn output_point(&self, vout: u32) -> OutPoint {
        OutPoint::new(self.hash(), vout)
    }

    /// Message signed for `input_index`: `H(tx hash || index)`.
    pub fn signature_hash(&self, input_index: usize) -> Result<Hash256> {
        if input_index >= self.inputs.len() {
            return Err(LedgerError::InvalidInputIndex(input_index));
        }

        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(self.hash().as_bytes());
        data.extend_from_slice(&(input_index as u32).to_le_bytes());

        Ok(Hash256::hash(&data))
    }

    pub fn sign(&mut self, input_index: usize, private_key: &PrivateKey) -> Result<()> {
        let message = self.signature_hash(input_index)?;
        let signature = private_key.sign(&message)?;
        let public_key = private_key.public_key()?;

        self.inputs[input_index].signature = Some(InputSignature {
            signature,
            public_key,
        });

        Ok(())
    }

    pub fn sign_all(&mut self, private_key: &PrivateKey) -> Result<()> {
        for input_index in 0..self.inputs.len() {
            self.sign(input_index, private_key)?;
        }
        Ok(())
    }

    /// Checks the signature on one input against the output it spends.
    pub fn verify_input(&self, input_index: usize, spent: &TxOutput) -> Result<()> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or(LedgerError::InvalidInputIndex(input_index))?;

        let auth = input
            .signature
            .as_ref()
            .ok_or(LedgerError::MissingSignature(input_index))?;

        let signer = auth.public_key.to_address();
        if signer != spent.address {
            return Err(LedgerError::AddressMismatch {
                input: input_index,
                signer,
                owner: spent.address.clone(),
            });
        }

        let message = self.signature_hash(input_index)?;
        if !auth.public_key.verify(&message, &auth.signature)? {
            return Err(LedgerError::InvalidSignature(input_index));
        }

        Ok(())
    }

    /// Full validation against the given UTXO view.
    pub fn validate(&self, utxo_set: &UtxoSet) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        if self.outputs.is_empty() {
            return Err(LedgerError::NoOutputs);
        }

        let mut seen_outpoints = HashSet::new();
        for input in &self.inputs {
            if !seen_outpoints.insert(input.previous_output) {
                return Err(LedgerError::DuplicateInput(input.previous_output.to_string()));
            }
        }

        let mut total_input_value = 0u64;
        for (input_index, input) in self.inputs.iter().enumerate() {
            let spent = utxo_set
                .get(&input.previous_output)
                .ok_or_else(|| LedgerError::UtxoNotFound(input.previous_output.to_string()))?;

            self.verify_input(input_index, spent)?;
            total_input_value = total_input_value
                .checked_add(spent.amount)
                .ok_or(LedgerError::ValueOverflow)?;
        }

        // No fees: whatever goes in must come out
        let total_output_value = self.total_output_value()?;
        if total_input_value != total_output_value {
            return Err(LedgerError::UnbalancedTransaction {
                inputs: total_input_value,
                outputs: total_output_value,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self, utxo_set: &UtxoSet) -> bool {
        match self.validate(utxo_set) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Transaction {} rejected: {}", self.hash(), e);
                false
            }
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Hashable for Transaction {
    /// Covers version, spent outpoints, outputs, timestamp and payload.
    /// Signatures are left out so that signing does not move the hash.
    fn hash(&self) -> Hash256 {
        let mut encoder = CanonicalEncoder::new();
        encoder.put_u32(self.version);

        encoder.put_u32(self.inputs.len() as u32);
        for input in &self.inputs {
            encoder
                .put_hash(&input.previous_output.txid)
                .put_u32(input.previous_output.vout);
        }

        encoder.put_u32(self.outputs.len() as u32);
        for output in &self.outputs {
            encoder.put_str(&output.address).put_u64(output.amount);
        }

        encoder.put_u64(self.timestamp).put_bytes(&self.payload);
        encoder.digest()
    }
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Builds and signs a payment out of one address's UTXOs.
#[derive(Debug)]
pub struct TransactionBuilder<'a> {
    utxo_set: &'a UtxoSet,
    outputs: Vec<TxOutput>,
    timestamp: Option<u64>,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(utxo_set: &'a UtxoSet) -> Self {
        Self {
            utxo_set,
            outputs: Vec::new(),
            timestamp: None,
        }
    }

    pub fn add_output(&mut self, address: &str, amount: u64) -> &mut Self {
        self.outputs.push(TxOutput {
            address: address.to_string(),
            amount,
        });
        self
    }

    pub fn timestamp(&mut self, timestamp: u64) -> &mut Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(&self, from: &str, private_key: &PrivateKey) -> Result<Transaction> {
        if self.outputs.is_empty() {
            return Err(LedgerError::NoOutputs);
        }

        // A payment with no inputs would read as a coinbase
        if self.outputs.iter().any(|output| output.amount == 0) {
            return Err(LedgerError::ZeroAmount);
        }

        if private_key.address()? != from {
            return Err(LedgerError::KeyMismatch(from.to_string()));
        }

        let total_needed = checked_total(self.outputs.iter().map(|o| o.amount))?;

        // Largest first, outpoint order breaking ties so selection is stable
        let mut available = self.utxo_set.utxos_of(from);
        available.sort_by(|a, b| b.1.amount.cmp(&a.1.amount).then(a.0.cmp(&b.0)));

        let total_available = available.iter().fold(0u64, |acc, (_, o)| acc.saturating_add(o.amount));
        if total_available < total_needed {
            return Err(LedgerError::InsufficientBalance {
                required: total_needed,
                available: total_available,
            });
        }

        let mut tx = Transaction::with_timestamp(self.timestamp.unwrap_or_else(now_millis));
        let mut selected_value = 0u64;

        for (outpoint, output) in available {
            tx.add_input(outpoint);
            selected_value = selected_value
                .checked_add(output.amount)
                .ok_or(LedgerError::ValueOverflow)?;
            if selected_value >= total_needed {
                break;
            }
        }

        tx.outputs.extend(self.outputs.iter().cloned());

        let change = selected_value - total_needed;
        if change > 0 {
            tx.add_output(from, change);
        }

        tx.sign_all(private_key)?;

        log::debug!(
            "Built transaction {} spending {} inputs ({} change)",
            tx.hash(),
            tx.inputs.len(),
            change
        );

        Ok(tx)
    }
}
