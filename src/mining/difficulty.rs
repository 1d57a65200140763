use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A SHA-256 digest has 64 hex digits.
pub const MAX_DIFFICULTY: u32 = 64;

/// Proof-of-work predicate: the block hash, rendered in hex, must start with
/// `leading_zeros` zero digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTarget {
    leading_zeros: u32,
}

impl DifficultyTarget {
    pub fn new(leading_zeros: u32) -> Result<Self> {
        if leading_zeros > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(leading_zeros));
        }
        Ok(Self { leading_zeros })
    }

    pub fn leading_zeros(&self) -> u32 {
        self.leading_zeros
    }

    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        hash.leading_zero_hex_digits() >= self.leading_zeros
    }

    /// Mean number of hashes needed to meet the target (`16^d`).
    pub fn expected_attempts(&self) -> f64 {
        16f64.powi(self.leading_zeros as i32)
    }

    /// Upper bound for a satisfying hash, as raw bytes: every digit after
    /// the required zeros is `f`.
    pub fn target_hash(&self) -> [u8; 32] {
        let mut target = [0xFFu8; 32];
        let zero_bytes = (self.leading_zeros / 2) as usize;
        for byte in target.iter_mut().take(zero_bytes) {
            *byte = 0x00;
        }
        if self.leading_zeros % 2 == 1 && zero_bytes < 32 {
            target[zero_bytes] = 0x0F;
        }
        target
    }
}

impl fmt::Display for DifficultyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} leading zero hex digits", self.leading_zeros)
    }
}
