use alloy::primitives::{Address, B256};

/// Token address discovered through a watched-contract transaction and waiting
/// for market data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateToken {
    pub address: Address,
    pub block_number: u64,
    pub tx_hash: B256,
    pub first_seen_ms: u64,
    pub retry_count: u32,
}

impl CandidateToken {
    pub fn new(address: Address, block_number: u64, tx_hash: B256, first_seen_ms: u64) -> Self {
        Self {
            address,
            block_number,
            tx_hash,
            first_seen_ms,
            retry_count: 0,
        }
    }
}

/// Point-in-time market data for the first trading pair of a token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub price_usd: Option<f64>,
    pub fdv: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume_24h: Option<f64>,
    pub pair_created_at_ms: Option<u64>,
    pub symbol: Option<String>,
    pub link: String,
    pub image_url: Option<String>,
    pub buy_tax_pct: f64,
    pub sell_tax_pct: f64,
}

impl Snapshot {
    pub fn is_usable(&self) -> bool {
        self.price_usd.is_some() && self.pair_created_at_ms.is_some()
    }

    /// Usable and created strictly after `epoch_ms`.
    pub fn is_eligible(&self, epoch_ms: u64) -> bool {
        match (self.price_usd, self.pair_created_at_ms) {
            (Some(_), Some(created_ms)) => created_ms > epoch_ms,
            _ => false,
        }
    }
}
