use crate::core::{Block, BlockHeader, Blockchain};
use crate::merkle::{self, MerkleProof};
use crate::{LedgerError, Result};

/// Header-only view of a chain. Inclusion claims are checked by replaying a
/// merkle proof against a stored header's root.
#[derive(Debug, Clone, Default)]
pub struct LightClient {
    headers: Vec<BlockHeader>,
}

impl LightClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the header projection of `block`.
    pub fn record_header(&mut self, block: &Block) {
        self.record(block.header());
    }

    /// Stores `header` as given. Linkage is not checked here, see
    /// [`LightClient::is_header_chain_linked`].
    pub fn record(&mut self, header: BlockHeader) {
        log::debug!("Recorded header {} at index {}", header.hash, self.headers.len());
        self.headers.push(header);
    }

    /// Accepts a header in its bincode wire form.
    pub fn record_header_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let header = BlockHeader::from_bytes(bytes)?;
        self.record(header);
        Ok(())
    }

    /// Appends the headers of `chain` that follow the last stored header.
    /// Starts from genesis when nothing is stored or the last stored header
    /// is not part of `chain`. Returns how many were added.
    pub fn sync_from(&mut self, chain: &Blockchain) -> usize {
        let blocks = chain.blocks();
        let start = match self.headers.last() {
            None => 0,
            Some(last) => match blocks.iter().position(|block| block.hash == last.hash) {
                Some(index) => index + 1,
                None => {
                    log::warn!("Last stored header {} is not in the chain, syncing from genesis", last.hash);
                    0
                }
            },
        };

        for block in &blocks[start..] {
            self.record_header(block);
        }
        blocks.len() - start
    }

    pub fn header(&self, index: usize) -> Option<&BlockHeader> {
        self.headers.get(index)
    }

    pub fn headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// True iff the header at `header_index` exists and `proof` replays
    /// `tx_data` to its merkle root.
    pub fn verify_transaction(
        &self,
        tx_data: impl AsRef<[u8]>,
        header_index: usize,
        proof: &MerkleProof,
    ) -> bool {
        match self.require_inclusion(tx_data, header_index, proof) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("SPV check against header {} failed: {}", header_index, e);
                false
            }
        }
    }

    pub fn require_inclusion(
        &self,
        tx_data: impl AsRef<[u8]>,
        header_index: usize,
        proof: &MerkleProof,
    ) -> Result<()> {
        let header = self
            .headers
            .get(header_index)
            .ok_or(LedgerError::HeaderNotFound(header_index))?;

        if merkle::verify(tx_data, proof, &header.merkle_root) {
            Ok(())
        } else {
            Err(LedgerError::InvalidProof)
        }
    }

    /// Every stored header after the first names its predecessor's hash.
    pub fn is_header_chain_linked(&self) -> bool {
        self.headers
            .windows(2)
            .all(|pair| pair[1].previous_hash == pair[0].hash)
    }
}
