use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Which side of the running hash the sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Hash256,
    pub side: Side,
}

/// Sibling path from a leaf up to the root.
///
/// A proof carries no reference to the tree it came from; it can be shipped to
/// a light client and replayed against nothing more than a header's merkle
/// root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    steps: Vec<ProofStep>,
}

impl MerkleProof {
    pub fn new(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn push(&mut self, sibling: Hash256, side: Side) {
        self.steps.push(ProofStep { sibling, side });
    }

    /// Replays the path starting from an already-hashed leaf.
    pub fn root_from_leaf(&self, leaf: Hash256) -> Hash256 {
        self.steps.iter().fold(leaf, |running, step| match step.side {
            Side::Left => Hash256::hash_pair(&step.sibling, &running),
            Side::Right => Hash256::hash_pair(&running, &step.sibling),
        })
    }

    pub fn verify(&self, item: impl AsRef<[u8]>, claimed_root: &Hash256) -> bool {
        verify(item, self, claimed_root)
    }

    /// Like [`MerkleProof::verify`], but reports a rejection as `InvalidProof`.
    pub fn check(&self, item: impl AsRef<[u8]>, claimed_root: &Hash256) -> Result<()> {
        if self.verify(item, claimed_root) {
            Ok(())
        } else {
            Err(LedgerError::InvalidProof)
        }
    }
}

/// Checks that `item` is a leaf of the tree whose root is `claimed_root`.
///
/// Needs neither the tree nor the other leaves. An empty proof is accepted
/// exactly when the item is the only leaf.
pub fn verify(item: impl AsRef<[u8]>, proof: &MerkleProof, claimed_root: &Hash256) -> bool {
    let leaf = Hash256::hash(item.as_ref());
    proof.root_from_leaf(leaf) == *claimed_root
}
