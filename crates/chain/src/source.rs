use alloy::consensus::Transaction as TransactionTrait;
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider};
use alloy::transports::TransportResult;
use anyhow::{anyhow, Result};
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tracing::warn;

/// Hash and destination of a transaction included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRef {
    pub hash: B256,
    pub to: Option<Address>,
}

/// Read access to the chain needed by the scanner.
pub trait ChainSource {
    fn latest_block_number(&self) -> impl Future<Output = Result<u64>> + Send;

    fn block_transactions(&self, number: u64) -> impl Future<Output = Result<Vec<TxRef>>> + Send;

    /// Emitting addresses of every log in the receipt, or `None` when the node
    /// has no receipt for `hash`.
    fn receipt_log_addresses(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<Vec<Address>>>> + Send;
}

#[derive(Clone)]
pub struct RpcChainSource {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainSource {
    pub fn new(provider: DynProvider, timeout_ms: u64) -> Self {
        Self {
            provider,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn bounded<T, F>(&self, call: &'static str, fut: F) -> Result<T>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(err) => {
                warn!(
                    ?err,
                    call,
                    timeout_ms = self.timeout.as_millis(),
                    "rpc call timeout"
                );
                Err(anyhow!(
                    "{call} timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

impl ChainSource for RpcChainSource {
    async fn latest_block_number(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn block_transactions(&self, number: u64) -> Result<Vec<TxRef>> {
        let call = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full();
        let block = self
            .bounded("eth_getBlockByNumber", call)
            .await?
            .ok_or_else(|| anyhow!("block {number} not found"))?;
        Ok(block
            .transactions
            .txns()
            .map(|tx| TxRef {
                hash: tx.tx_hash(),
                to: TransactionTrait::to(tx),
            })
            .collect())
    }

    async fn receipt_log_addresses(&self, hash: B256) -> Result<Option<Vec<Address>>> {
        let receipt = self
            .bounded(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(hash),
            )
            .await?;
        Ok(receipt.map(|receipt| {
            receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.address())
                .collect()
        }))
    }
}
