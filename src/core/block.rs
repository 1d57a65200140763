use crate::core::Transaction;
use crate::core::encoding::CanonicalEncoder;
use crate::crypto::hash::{Hash256, Hashable};
use crate::merkle::{MerkleProof, MerkleTree};
use crate::mining::DifficultyTarget;
use crate::Result;
use serde::{Deserialize, Serialize};

/// The merkle tree is never serialized; it is rebuilt from `transactions`
/// whenever a block is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BlockWire")]
pub struct Block {
    pub previous_hash: Hash256,
    pub timestamp: u64,
    pub merkle_root: Hash256,
    pub nonce: u64,
    pub hash: Hash256,
    pub transactions: Vec<Transaction>,
    #[serde(skip)]
    merkle_tree: MerkleTree<Hash256>,
}

#[derive(Deserialize)]
struct BlockWire {
    previous_hash: Hash256,
    timestamp: u64,
    merkle_root: Hash256,
    nonce: u64,
    hash: Hash256,
    transactions: Vec<Transaction>,
}

impl From<BlockWire> for Block {
    fn from(wire: BlockWire) -> Self {
        let merkle_tree = build_tree(&wire.transactions);
        Self {
            previous_hash: wire.previous_hash,
            timestamp: wire.timestamp,
            merkle_root: wire.merkle_root,
            nonce: wire.nonce,
            hash: wire.hash,
            transactions: wire.transactions,
            merkle_tree,
        }
    }
}

/// What a light client keeps of a block. Inclusion of a transaction is
/// proven against `merkle_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: Hash256,
    pub previous_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u64,
}

impl Block {
    /// Builds the merkle tree over the transaction hashes and hashes the
    /// header with nonce 0. The block is not mined yet.
    pub fn assemble(transactions: Vec<Transaction>, previous_hash: Hash256, timestamp: u64) -> Self {
        let merkle_tree = build_tree(&transactions);
        // An empty block commits to the zero digest
        let merkle_root = merkle_tree.root().unwrap_or_else(Hash256::zero);

        let mut block = Self {
            previous_hash,
            timestamp,
            merkle_root,
            nonce: 0,
            hash: Hash256::zero(),
            transactions,
            merkle_tree,
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash256 {
        build_tree(transactions).root().unwrap_or_else(Hash256::zero)
    }

    /// Rebuilds the tree from the current transactions, stores its root and
    /// rehashes. The block must be mined again afterwards.
    pub fn refresh_merkle_root(&mut self) {
        self.merkle_tree = build_tree(&self.transactions);
        self.merkle_root = self.merkle_tree.root().unwrap_or_else(Hash256::zero);
        self.hash = self.compute_hash();
    }

    /// True when the block's own tree, used for `prove_transaction`, commits
    /// to `merkle_root` and to the current transactions.
    pub fn merkle_tree_matches(&self) -> bool {
        let tree_root = self.merkle_tree.root().unwrap_or_else(Hash256::zero);
        tree_root == self.merkle_root
            && self.merkle_tree.leaf_count() == self.transactions.len()
            && self
                .merkle_tree
                .leaves()
                .into_iter()
                .zip(&self.transactions)
                .all(|(leaf, tx)| *leaf == tx.hash())
    }

    /// `H(previous_hash || timestamp || merkle_root || nonce)`
    pub fn compute_hash(&self) -> Hash256 {
        header_hash(&self.previous_hash, self.timestamp, &self.merkle_root, self.nonce)
    }

    /// Hash this block would have with `nonce`, without modifying it.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash256 {
        header_hash(&self.previous_hash, self.timestamp, &self.merkle_root, nonce)
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.compute_hash();
    }

    pub fn increment_nonce(&mut self) {
        self.set_nonce(self.nonce.wrapping_add(1));
    }

    pub fn meets_difficulty(&self, target: &DifficultyTarget) -> bool {
        target.is_met_by(&self.hash)
    }

    /// Single-threaded nonce search. Returns the number of hashes computed.
    ///
    /// There is no attempt limit: expected work is about `16^difficulty`
    /// hashes. Use [`crate::mining::Miner`] for a parallel, cancellable search.
    pub fn mine(&mut self, target: &DifficultyTarget) -> u64 {
        let mut attempts = 0u64;
        while !self.meets_difficulty(target) {
            self.increment_nonce();
            attempts += 1;
        }
        attempts
    }

    /// True when the stored hash and merkle root both match the block's
    /// current contents.
    pub fn is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
            && self.merkle_root == Self::calculate_merkle_root(&self.transactions)
            && self.merkle_tree_matches()
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            hash: self.hash,
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            timestamp: self.timestamp,
        }
    }

    pub fn merkle_tree(&self) -> &MerkleTree<Hash256> {
        &self.merkle_tree
    }

    /// Inclusion proof for a transaction of this block, replayable with
    /// `merkle::verify(tx_hash, &proof, &header.merkle_root)`.
    pub fn prove_transaction(&self, tx_hash: &Hash256) -> Option<MerkleProof> {
        self.merkle_tree.prove_inclusion(tx_hash)
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn size(&self) -> usize {
        bincode::serialized_size(self).map(|size| size as usize).unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn contains_transaction(&self, tx_hash: &Hash256) -> bool {
        self.transactions.iter().any(|tx| &tx.hash() == tx_hash)
    }
}

impl Hashable for Block {
    fn hash(&self) -> Hash256 {
        self.compute_hash()
    }
}

impl BlockHeader {
    /// Recomputes the hash a full block with this header would have for
    /// `nonce`. Light clients don't store the nonce, so this is only useful
    /// when the caller has it from elsewhere.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash256 {
        header_hash(&self.previous_hash, self.timestamp, &self.merkle_root, nonce)
    }

    /// Wire form of the header
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn build_tree(transactions: &[Transaction]) -> MerkleTree<Hash256> {
    MerkleTree::build(transactions.iter().map(|tx| tx.hash()))
}

fn header_hash(previous_hash: &Hash256, timestamp: u64, merkle_root: &Hash256, nonce: u64) -> Hash256 {
    let mut encoder = CanonicalEncoder::new();
    encoder
        .put_hash(previous_hash)
        .put_u64(timestamp)
        .put_hash(merkle_root)
        .put_u64(nonce);
    encoder.digest()
}
