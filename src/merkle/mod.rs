//! Merkle commitments over transaction sets

pub mod tree;
pub mod proof;

pub use tree::{MerkleTree, MerkleNode};
pub use proof::{MerkleProof, ProofStep, Side, verify};
