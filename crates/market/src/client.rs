use crate::error::FetchError;
use crate::models::TokenPairsResponse;
use alloy::primitives::Address;
use anyhow::Result;
use moonwatch_core::config::MarketConfig;
use moonwatch_core::types::Snapshot;
use moonwatch_core::utils::lower_hex;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Source of market snapshots for token addresses.
///
/// `Ok(None)` means the indexer has no priced pair for the token yet; errors
/// are upstream failures. Callers treat both as "not resolvable this round".
pub trait SnapshotSource {
    fn fetch(
        &self,
        address: Address,
    ) -> impl Future<Output = std::result::Result<Option<Snapshot>, FetchError>> + Send;
}

#[derive(Clone)]
pub struct DexScreenerClient {
    client: Client,
    api_base: String,
    link_base: String,
}

impl DexScreenerClient {
    pub fn new(cfg: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            link_base: cfg.link_base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_snapshot(
        &self,
        address: Address,
    ) -> std::result::Result<Option<Snapshot>, FetchError> {
        let token = lower_hex(&address);
        let url = format!("{}/{}", self.api_base, token);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.bytes().await?;
        let parsed: TokenPairsResponse = serde_json::from_slice(&body)?;
        let link = format!("{}/{}", self.link_base, token);
        let snapshot = parsed.first_pair().and_then(|pair| pair.into_snapshot(link));
        if snapshot.is_none() {
            debug!(%address, "no priced pair yet");
        }
        Ok(snapshot)
    }
}

impl SnapshotSource for DexScreenerClient {
    async fn fetch(&self, address: Address) -> std::result::Result<Option<Snapshot>, FetchError> {
        self.fetch_snapshot(address).await
    }
}
