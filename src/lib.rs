//! Merkle Ledger - a small verifiable UTXO ledger
//!
//! This library implements:
//! - SHA-256 hashing and binary Merkle trees with inclusion proofs
//! - Signed UTXO transactions over secp256k1
//! - Proof-of-work blocks mined by a parallel, cancellable miner
//! - A validated chain with atomic UTXO updates
//! - A header-only light client for SPV checks

pub mod core;
pub mod crypto;
pub mod merkle;
pub mod mining;
pub mod consensus;
pub mod spv;
pub mod error;
pub mod config;
pub mod logging;

pub use error::{LedgerError, Result};
