use crate::error::ProviderError;
use alloy::{
    eips::BlockNumberOrTag,
    network::TransactionBuilder,
    primitives::{
        Address,
        B256,
        Bytes,
        Log,
        TxHash,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use std::{
    future::Future,
    time::Duration,
};
use url::Url;

/// Receipt of a transaction that made it into a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinedReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<Log>,
}

/// Read access to the chain, independent of the signing wallet.
pub trait ChainRpc {
    fn block_number(&self) -> impl Future<Output = Result<u64, ProviderError>>;

    /// Hash of block `number`, or `None` while it has not been produced.
    fn block_hash(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Option<B256>, ProviderError>>;

    /// `eth_call` against the latest block.
    fn call(
        &self,
        to: Address,
        input: Bytes,
    ) -> impl Future<Output = Result<Bytes, ProviderError>>;

    fn receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<MinedReceipt>, ProviderError>>;
}

/// Runs a typed view call and decodes its return value.
pub async fn call_view<R: ChainRpc, C: SolCall>(
    rpc: &R,
    to: Address,
    call: &C,
) -> Result<C::Return, ProviderError> {
    let output = rpc.call(to, Bytes::from(call.abi_encode())).await?;
    C::abi_decode_returns(&output, true).map_err(|e| {
        ProviderError::new(format!("failed to decode {} result: {e}", C::SIGNATURE))
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Retries `op` with exponential backoff until it succeeds or the attempt
/// budget is spent; the last error is returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => {
                tracing::warn!(%err, what, attempt, "rpc retries exhausted");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.backoff(attempt);
                tracing::warn!(%err, what, attempt, ?delay, "rpc call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// JSON-RPC chain reader backed by an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyChain {
    provider: DynProvider,
}

impl AlloyChain {
    pub fn connect(rpc_url: &str) -> Result<Self, ProviderError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| ProviderError::new(format!("invalid RPC URL {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new().on_http(url).erased();
        Ok(Self { provider })
    }
}

impl ChainRpc for AlloyChain {
    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, ProviderError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await?;
        Ok(block.map(|block| block.header.hash))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ProviderError> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        Ok(self.provider.call(tx).await?)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<MinedReceipt>, ProviderError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|receipt| MinedReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            success: receipt.status(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    #[tokio::test(start_paused = true)]
    async fn with_retry__recovers_after_transient_failures() {
        // given
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        // when
        let counter = &calls;
        let result = with_retry(&policy, "block_number", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::new("connection reset"))
            } else {
                Ok(7u64)
            }
        })
        .await;

        // then
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry__gives_up_after_max_attempts() {
        // given
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        // when
        let counter = &calls;
        let result: Result<u64, _> = with_retry(&policy, "block_number", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::new("unavailable"))
        })
        .await;

        // then
        assert_eq!(result, Err(ProviderError::new("unavailable")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff__doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
    }
}
