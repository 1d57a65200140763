//! Proof-of-work search

pub mod miner;
pub mod difficulty;

pub use miner::{Miner, MiningResult, MiningStats, CancellationToken};
pub use difficulty::{DifficultyTarget, MAX_DIFFICULTY};
