use crate::source::ChainSource;
use alloy::primitives::{Address, B256};
use anyhow::{anyhow, Result};
use moonwatch_core::dedupe::SeenSet;
use moonwatch_core::types::CandidateToken;
use moonwatch_core::utils::now_ms;
use tracing::{debug, info};

/// Finds token addresses emitted by transactions sent to the watched contract
/// in the latest block.
pub struct ChainScanner<S> {
    source: S,
    watched: Address,
    last_scanned: Option<u64>,
}

impl<S> ChainScanner<S>
where
    S: ChainSource,
{
    pub fn new(source: S, watched: Address) -> Self {
        Self {
            source,
            watched,
            last_scanned: None,
        }
    }

    pub fn watched(&self) -> Address {
        self.watched
    }

    /// Last block whose receipts were all read and committed.
    pub fn last_scanned(&self) -> Option<u64> {
        self.last_scanned
    }

    pub async fn scan(&mut self, seen: &mut SeenSet<Address>) -> Result<Vec<CandidateToken>> {
        self.scan_with_now(seen, now_ms()).await
    }

    /// Every RPC read completes before `seen` is touched, so a failed call
    /// leaves no partial state and the same block is retried next time.
    async fn scan_with_now(
        &mut self,
        seen: &mut SeenSet<Address>,
        now_ms: u64,
    ) -> Result<Vec<CandidateToken>> {
        let latest = self.source.latest_block_number().await?;
        if self.last_scanned == Some(latest) {
            debug!(block = latest, "latest block already scanned");
            return Ok(Vec::new());
        }

        let txs = self.source.block_transactions(latest).await?;
        let mut observed: Vec<(Address, B256)> = Vec::new();
        for tx in txs.iter().filter(|tx| tx.to == Some(self.watched)) {
            let logs = self
                .source
                .receipt_log_addresses(tx.hash)
                .await?
                .ok_or_else(|| anyhow!("receipt unavailable for {}", tx.hash))?;
            observed.extend(logs.into_iter().map(|address| (address, tx.hash)));
        }

        let mut candidates = Vec::new();
        for (address, tx_hash) in observed {
            if !seen.insert(address) {
                continue;
            }
            info!(%address, block = latest, %tx_hash, "new token candidate");
            candidates.push(CandidateToken::new(address, latest, tx_hash, now_ms));
        }
        self.last_scanned = Some(latest);
        debug!(
            block = latest,
            txs = txs.len(),
            new_candidates = candidates.len(),
            "block scanned"
        );
        Ok(candidates)
    }
}
