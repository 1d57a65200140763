use crate::core::Block;
use crate::crypto::hash::Hash256;
use crate::mining::difficulty::DifficultyTarget;
use crate::{LedgerError, Result};
use std::sync::{Arc, Mutex, atomic::{AtomicBool, AtomicU64, Ordering}};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// Cooperative stop signal for an in-flight nonce search. Clones share the
/// same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningStats {
    pub total_hashes: u64,
    pub blocks_mined: u64,
    pub threads: usize,
    pub uptime_seconds: u64,
    pub hashrate: f64,
}

#[derive(Debug, Clone)]
pub struct MiningResult {
    pub nonce: u64,
    pub hash: Hash256,
    pub attempts: u64,
    pub elapsed: Duration,
    pub worker: usize,
}

/// Parallel proof-of-work search.
///
/// Worker `w` of `n` tries nonces `start + 1 + w + k*n`, so the ranges never
/// overlap. The first worker to hit the target claims the win and the rest
/// stop at their next iteration.
#[derive(Debug, Clone)]
pub struct Miner {
    threads: usize,
    hash_counter: Arc<AtomicU64>,
    blocks_mined: Arc<AtomicU64>,
    start_time: Instant,
}

impl Miner {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            hash_counter: Arc::new(AtomicU64::new(0)),
            blocks_mined: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn get_stats(&self) -> MiningStats {
        let total_hashes = self.hash_counter.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed();
        let hashrate = if uptime.as_secs_f64() > 0.0 {
            total_hashes as f64 / uptime.as_secs_f64()
        } else {
            0.0
        };

        MiningStats {
            total_hashes,
            blocks_mined: self.blocks_mined.load(Ordering::Relaxed),
            threads: self.threads,
            uptime_seconds: uptime.as_secs(),
            hashrate,
        }
    }

    /// Searches for a nonce meeting `target` and writes it into `block`.
    ///
    /// Returns `MiningCancelled` if `cancel` fires first; `block` is then
    /// left untouched.
    pub fn mine(
        &self,
        block: &mut Block,
        target: &DifficultyTarget,
        cancel: &CancellationToken,
    ) -> Result<MiningResult> {
        if cancel.is_cancelled() {
            return Err(LedgerError::MiningCancelled);
        }

        let start_time = Instant::now();

        if block.meets_difficulty(target) {
            return Ok(self.finish(block, 0, 0, start_time));
        }

        log::debug!(
            "⛏️  Searching nonce for block on {} ({}, {} threads)",
            block.previous_hash,
            target,
            self.threads
        );

        let found = AtomicBool::new(false);
        let winner: Mutex<Option<(u64, usize)>> = Mutex::new(None);
        let attempts = AtomicU64::new(0);
        let start_nonce = block.nonce;
        let candidate: &Block = &*block;

        std::thread::scope(|scope| {
            for worker in 0..self.threads {
                let found = &found;
                let winner = &winner;
                let attempts = &attempts;

                scope.spawn(move || {
                    let step = self.threads as u64;
                    let mut nonce = start_nonce.wrapping_add(1 + worker as u64);
                    let mut local_attempts = 0u64;

                    while !found.load(Ordering::Relaxed) && !cancel.is_cancelled() {
                        let hash = candidate.hash_with_nonce(nonce);
                        local_attempts += 1;

                        if target.is_met_by(&hash) {
                            if found
                                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                                .is_ok()
                            {
                                if let Ok(mut slot) = winner.lock() {
                                    *slot = Some((nonce, worker));
                                }
                            }
                            break;
                        }

                        nonce = nonce.wrapping_add(step);
                    }

                    attempts.fetch_add(local_attempts, Ordering::Relaxed);
                });
            }
        });

        let attempts = attempts.into_inner();
        self.hash_counter.fetch_add(attempts, Ordering::Relaxed);

        match winner.into_inner()? {
            Some((nonce, worker)) => {
                block.set_nonce(nonce);
                Ok(self.finish(block, attempts, worker, start_time))
            }
            None => {
                log::warn!("🛑 Mining cancelled after {} hashes", attempts);
                Err(LedgerError::MiningCancelled)
            }
        }
    }

    /// Runs [`Miner::mine`] on tokio's blocking pool. Cancelling the token
    /// stops the workers; dropping the future alone does not.
    pub async fn mine_async(
        &self,
        mut block: Block,
        target: DifficultyTarget,
        cancel: CancellationToken,
    ) -> Result<(Block, MiningResult)> {
        let miner = self.clone();

        tokio::task::spawn_blocking(move || {
            let result = miner.mine(&mut block, &target, &cancel)?;
            Ok((block, result))
        })
        .await
        .map_err(|e| LedgerError::Mining(format!("Mining task failed: {}", e)))?
    }

    fn finish(&self, block: &Block, attempts: u64, worker: usize, start_time: Instant) -> MiningResult {
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
        let elapsed = start_time.elapsed();

        log::info!(
            "✅ Block mined! Hash: {}, nonce: {}, {} hashes in {:.3}s",
            block.hash,
            block.nonce,
            attempts,
            elapsed.as_secs_f64()
        );

        MiningResult {
            nonce: block.nonce,
            hash: block.hash,
            attempts,
            elapsed,
            worker,
        }
    }
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::core::transaction::TxOutput;

    fn candidate() -> Block {
        let coinbase = Transaction::new_coinbase(
            vec![TxOutput { address: "mlgminer".to_string(), amount: 50 }],
            1,
            "miner test",
            1_000,
        );
        Block::assemble(vec![coinbase], Hash256::hash(b"parent"), 2_000)
    }

    #[test]
    fn test_parallel_mining_meets_target() -> Result<()> {
        let miner = Miner::new(4);

        for difficulty in 0..=3 {
            let target = DifficultyTarget::new(difficulty)?;
            let mut block = candidate();

            let result = miner.mine(&mut block, &target, &CancellationToken::new())?;

            assert!(block.meets_difficulty(&target));
            assert_eq!(block.hash, block.compute_hash());
            assert_eq!(result.nonce, block.nonce);
            assert_eq!(result.hash, block.hash);
        }

        assert_eq!(miner.get_stats().blocks_mined, 4);
        Ok(())
    }

    #[test]
    fn test_single_thread_matches_sequential_search() -> Result<()> {
        let target = DifficultyTarget::new(2)?;

        let mut sequential = candidate();
        sequential.mine(&target);

        let mut parallel = candidate();
        Miner::new(1).mine(&mut parallel, &target, &CancellationToken::new())?;

        assert_eq!(sequential.nonce, parallel.nonce);
        assert_eq!(sequential.hash, parallel.hash);
        Ok(())
    }

    #[test]
    fn test_cancelled_before_start() -> Result<()> {
        let token = CancellationToken::new();
        token.cancel();

        let mut block = candidate();
        let original = block.clone();
        let result = Miner::new(2).mine(&mut block, &DifficultyTarget::new(4)?, &token);

        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(block, original);
        Ok(())
    }

    #[test]
    fn test_cancel_in_flight() -> Result<()> {
        let miner = Miner::new(2);
        let token = CancellationToken::new();
        // 64 zero digits is unreachable, so only cancellation can end this
        let target = DifficultyTarget::new(64)?;

        let canceller = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let mut block = candidate();
        let result = miner.mine(&mut block, &target, &token);
        handle.join().unwrap();

        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(block.nonce, 0);
        assert!(miner.get_stats().total_hashes > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_mine_async() -> Result<()> {
        let miner = Miner::new(2);
        let target = DifficultyTarget::new(2)?;

        let (block, result) = miner
            .mine_async(candidate(), target, CancellationToken::new())
            .await?;

        assert!(block.meets_difficulty(&target));
        assert_eq!(result.hash, block.hash);
        Ok(())
    }
}
