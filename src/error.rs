use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    // Validation errors
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("UTXO not found: {0}")]
    UtxoNotFound(String),

    #[error("Input {0} is not signed")]
    MissingSignature(usize),

    #[error("Invalid signature on input {0}")]
    InvalidSignature(usize),

    #[error("Input {input} is signed by {signer}, but the output belongs to {owner}")]
    AddressMismatch { input: usize, signer: String, owner: String },

    #[error("Duplicate input in transaction: {0}")]
    DuplicateInput(String),

    #[error("Unbalanced transaction: inputs {inputs}, outputs {outputs}")]
    UnbalancedTransaction { inputs: u64, outputs: u64 },

    #[error("Transaction has no outputs")]
    NoOutputs,

    #[error("Payment amount must be non-zero")]
    ZeroAmount,

    #[error("Amounts overflow u64")]
    ValueOverflow,

    #[error("Invalid input index: {0}")]
    InvalidInputIndex(usize),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid coinbase: {0}")]
    InvalidCoinbase(String),

    #[error("Private key does not own address {0}")]
    KeyMismatch(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Duplicate transaction in block: {0}")]
    DuplicateTransaction(String),

    // Integrity errors
    #[error("Chain integrity broken at height {height}: {reason}")]
    ChainIntegrity { height: usize, reason: String },

    #[error("Stale block: expected previous hash {expected}, got {found}")]
    StaleBlock { expected: String, found: String },

    #[error("Block hash does not meet difficulty target")]
    InvalidProofOfWork,

    #[error("Stored block hash does not match header fields")]
    HashMismatch,

    #[error("Merkle root does not match block transactions")]
    MerkleRootMismatch,

    // Proof errors
    #[error("Merkle proof does not replay to the claimed root")]
    InvalidProof,

    #[error("No header recorded at index {0}")]
    HeaderNotFound(usize),

    #[error("Merkle tree is empty")]
    EmptyTree,

    // Mining errors
    #[error("Mining cancelled")]
    MiningCancelled,

    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(u32),

    #[error("Mining error: {0}")]
    Mining(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger lock poisoned")]
    LockPoisoned,
}

impl<T> From<std::sync::PoisonError<T>> for LedgerError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        LedgerError::LockPoisoned
    }
}
