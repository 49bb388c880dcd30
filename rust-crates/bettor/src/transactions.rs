use crate::{
    error::ProviderError,
    rpc::{
        ChainRpc,
        MinedReceipt,
        RetryPolicy,
        with_retry,
    },
};
use alloy::{
    network::TransactionBuilder,
    primitives::{
        Address,
        Bytes,
        TxHash,
    },
    rpc::types::TransactionRequest,
};
use std::time::Duration;

/// Contract call from `from` pinned to `chain_id`, so a wallet sitting on
/// another network refuses to sign it.
pub fn contract_call(
    from: Address,
    to: Address,
    chain_id: u64,
    input: impl Into<Bytes>,
) -> TransactionRequest {
    TransactionRequest::default()
        .with_from(from)
        .with_to(to)
        .with_chain_id(chain_id)
        .with_input(input.into())
}

/// Polls for the receipt of a submitted transaction.
#[derive(Clone, Copy, Debug)]
pub struct ReceiptWatcher {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl ReceiptWatcher {
    /// Resolves once `tx_hash` is mined. A pending transaction is waited on
    /// for as long as it takes; only RPC failures past the retry policy end
    /// the wait.
    pub async fn wait_mined<C: ChainRpc>(
        &self,
        chain: &C,
        tx_hash: TxHash,
    ) -> Result<MinedReceipt, ProviderError> {
        let mut polls: u64 = 0;
        loop {
            let receipt =
                with_retry(&self.retry, "transaction receipt", || chain.receipt(tx_hash)).await?;
            if let Some(receipt) = receipt {
                tracing::debug!(%tx_hash, block = receipt.block_number, polls, "transaction mined");
                return Ok(receipt);
            }
            polls += 1;
            if polls % 60 == 0 {
                tracing::info!(%tx_hash, polls, "transaction still pending");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Mined receipt that also executed successfully.
pub async fn wait_successful<C: ChainRpc>(
    watcher: &ReceiptWatcher,
    chain: &C,
    tx_hash: TxHash,
) -> Result<MinedReceipt, ProviderError> {
    let receipt = watcher.wait_mined(chain, tx_hash).await?;
    if receipt.success {
        Ok(receipt)
    } else {
        Err(ProviderError::new(format!(
            "transaction {tx_hash} reverted in block {}",
            receipt.block_number
        )))
    }
}
