use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::Result;
use moonwatch_core::config::ChainConfig;

#[derive(Clone)]
pub struct NodeClient {
    pub http: DynProvider,
}

impl NodeClient {
    pub async fn connect(cfg: &ChainConfig) -> Result<Self> {
        let http = ProviderBuilder::new()
            .connect(&cfg.rpc_http)
            .await?
            .erased();
        Ok(Self { http })
    }
}
