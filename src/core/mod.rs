//! Core ledger components

pub mod blockchain;
pub mod block;
pub mod encoding;
pub mod shared;
pub mod transaction;
pub mod utxo;

pub use blockchain::Blockchain;
pub use block::{Block, BlockHeader};
pub use shared::SharedBlockchain;
pub use transaction::{InputSignature, OutPoint, Transaction, TransactionBuilder, TxInput, TxOutput};
pub use utxo::UtxoSet;
