use crate::crypto::hash::Hash256;
use crate::merkle::proof::{MerkleProof, Side};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleNode<T> {
    Leaf {
        item: T,
        digest: Hash256,
    },
    Internal {
        left: Box<MerkleNode<T>>,
        right: Box<MerkleNode<T>>,
        digest: Hash256,
    },
}

impl<T> MerkleNode<T> {
    pub fn digest(&self) -> &Hash256 {
        match self {
            MerkleNode::Leaf { digest, .. } => digest,
            MerkleNode::Internal { digest, .. } => digest,
        }
    }
}

/// Binary hash tree over an ordered list of items.
///
/// Leaves hash the raw item bytes; parents hash `left || right`. A level with
/// an odd node count pairs its last node with itself, so a tree over
/// `[a, b, c]` has the same root as one over `[a, b, c, c]` (the Bitcoin
/// rule). Callers that need to tell those two trees apart must reject
/// duplicate leaves themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree<T> {
    root: Option<MerkleNode<T>>,
    leaf_count: usize,
    depth: usize,
}

impl<T> Default for MerkleTree<T> {
    fn default() -> Self {
        Self {
            root: None,
            leaf_count: 0,
            depth: 0,
        }
    }
}

impl<T> MerkleTree<T>
where
    T: AsRef<[u8]> + Clone + PartialEq,
{
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut level: Vec<MerkleNode<T>> = items
            .into_iter()
            .map(|item| {
                let digest = Hash256::hash(item.as_ref());
                MerkleNode::Leaf { item, digest }
            })
            .collect();

        let leaf_count = level.len();
        if leaf_count == 0 {
            return Self::default();
        }

        let mut depth = 0;
        while level.len() > 1 {
            let mut next_level = Vec::with_capacity((level.len() + 1) / 2);
            let mut nodes = level.into_iter();

            while let Some(left) = nodes.next() {
                let right = match nodes.next() {
                    Some(right) => right,
                    None => left.clone(), // odd level: duplicate the last node
                };
                let digest = Hash256::hash_pair(left.digest(), right.digest());
                next_level.push(MerkleNode::Internal {
                    left: Box::new(left),
                    right: Box::new(right),
                    digest,
                });
            }

            level = next_level;
            depth += 1;
        }

        Self {
            root: level.pop(),
            leaf_count,
            depth,
        }
    }

    pub fn prove_inclusion(&self, target: &T) -> Option<MerkleProof> {
        let root = self.root.as_ref()?;
        let mut proof = MerkleProof::default();

        if Self::collect_path(root, target, &mut proof) {
            Some(proof)
        } else {
            None
        }
    }

    // Depth-first: siblings are pushed while the recursion unwinds, which
    // yields them in leaf-to-root order.
    fn collect_path(node: &MerkleNode<T>, target: &T, proof: &mut MerkleProof) -> bool {
        match node {
            MerkleNode::Leaf { item, .. } => item == target,
            MerkleNode::Internal { left, right, .. } => {
                if Self::collect_path(left, target, proof) {
                    proof.push(*right.digest(), Side::Right);
                    true
                } else if Self::collect_path(right, target, proof) {
                    proof.push(*left.digest(), Side::Left);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn leaves(&self) -> Vec<&T> {
        let mut leaves = Vec::with_capacity(self.leaf_count);
        if let Some(root) = &self.root {
            Self::collect_leaves(root, &mut leaves);
        }
        // Drop the copies introduced by odd-level duplication
        leaves.truncate(self.leaf_count);
        leaves
    }

    fn collect_leaves<'a>(node: &'a MerkleNode<T>, out: &mut Vec<&'a T>) {
        match node {
            MerkleNode::Leaf { item, .. } => out.push(item),
            MerkleNode::Internal { left, right, .. } => {
                Self::collect_leaves(left, out);
                Self::collect_leaves(right, out);
            }
        }
    }
}

impl<T> MerkleTree<T> {
    pub fn root(&self) -> Option<Hash256> {
        self.root.as_ref().map(|node| *node.digest())
    }

    pub fn root_digest(&self) -> Result<Hash256> {
        self.root().ok_or(LedgerError::EmptyTree)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Same as [`crate::merkle::verify`]; the tree itself is not consulted.
    pub fn verify(item: impl AsRef<[u8]>, proof: &MerkleProof, claimed_root: &Hash256) -> bool {
        crate::merkle::proof::verify(item, proof, claimed_root)
    }
}
