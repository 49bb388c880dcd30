use crate::{
    activity_log::{
        ActivityLog,
        LogKind,
    },
    config::BettingConfig,
    error::{
        Error,
        ProviderError,
        Result,
    },
    rpc::{
        ChainRpc,
        RetryPolicy,
        with_retry,
    },
};
use alloy::primitives::B256;
use std::time::Duration;

/// The block that decides a bet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub resolving_block: u64,
    pub block_hash: B256,
    pub target_nibble: char,
}

/// Last hex character of the block hash, i.e. its low nibble.
pub fn target_nibble(hash: &B256) -> char {
    let low = hash[31] & 0x0f;
    char::from_digit(u32::from(low), 16).unwrap_or('0')
}

/// Waits until the chain has produced the block a bet is settled against.
///
/// Not-yet-mined blocks are waited for indefinitely; only RPC failures count
/// against the retry budget.
pub struct OutcomeWaiter {
    wait_blocks: u64,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl OutcomeWaiter {
    pub fn new(wait_blocks: u64, poll_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            wait_blocks,
            poll_interval,
            retry,
        }
    }

    pub fn from_config(config: &BettingConfig) -> Self {
        Self::new(config.wait_blocks, config.poll_interval, config.retry)
    }

    pub fn resolving_block(&self, bet_block: u64) -> u64 {
        bet_block.saturating_add(self.wait_blocks)
    }

    pub async fn await_outcome<C: ChainRpc>(
        &self,
        chain: &C,
        bet_block: u64,
        log: &mut ActivityLog,
    ) -> Result<Outcome> {
        let target = self.resolving_block(bet_block);
        match self.poll(chain, target).await {
            Ok(outcome) => {
                log.push(LogKind::BlockInfo {
                    block_number: outcome.resolving_block,
                    block_hash: outcome.block_hash,
                    target_byte: outcome.target_nibble,
                });
                Ok(outcome)
            }
            Err(err) => {
                let err = Error::Rpc {
                    reason: err.to_string(),
                };
                tracing::warn!(%err, block = target, "outcome block unavailable");
                log.message(err.to_string());
                Err(err)
            }
        }
    }

    async fn poll<C: ChainRpc>(
        &self,
        chain: &C,
        target: u64,
    ) -> std::result::Result<Outcome, ProviderError> {
        loop {
            let height = with_retry(&self.retry, "block number", || chain.block_number()).await?;
            if height >= target {
                break;
            }
            tracing::debug!(height, target, "waiting for outcome block");
            tokio::time::sleep(self.poll_interval).await;
        }
        loop {
            let hash =
                with_retry(&self.retry, "block hash", || chain.block_hash(target)).await?;
            if let Some(block_hash) = hash {
                return Ok(Outcome {
                    resolving_block: target,
                    block_hash,
                    target_nibble: target_nibble(&block_hash),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        FakeNetwork,
        test_config,
    };
    use proptest::prelude::*;

    #[tokio::test(start_paused = true)]
    async fn await_outcome__returns_only_once_target_block_exists() {
        // given
        let network = FakeNetwork::new();
        let bet_block = network.height();
        let waiter = OutcomeWaiter::from_config(&test_config());
        let mut log = ActivityLog::new();

        // when
        let outcome = waiter
            .await_outcome(&network.chain(), bet_block, &mut log)
            .await
            .unwrap();

        // then
        assert_eq!(outcome.resolving_block, bet_block + 4);
        assert!(network.height() >= bet_block + 4);
        assert_eq!(outcome.block_hash, network.block_hash_at(bet_block + 4));
        assert_eq!(
            log.entries()[0].kind,
            LogKind::BlockInfo {
                block_number: bet_block + 4,
                block_hash: outcome.block_hash,
                target_byte: outcome.target_nibble,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn await_outcome__rpc_down__gives_up_with_rpc_error() {
        // given
        let network = FakeNetwork::new();
        let config = test_config();
        network.fail_block_queries(config.retry.max_attempts);
        let mut log = ActivityLog::new();

        // when
        let result = OutcomeWaiter::from_config(&config)
            .await_outcome(&network.chain(), network.height(), &mut log)
            .await;

        // then
        assert!(matches!(result, Err(Error::Rpc { .. })));
        assert_eq!(log.len(), 1);
        assert!(log.plain_messages().all(|m| m.starts_with("RPC unavailable:")));
    }

    #[tokio::test(start_paused = true)]
    async fn await_outcome__transient_rpc_failure__still_resolves() {
        // given
        let network = FakeNetwork::new();
        let config = test_config();
        network.fail_block_queries(config.retry.max_attempts - 1);
        let mut log = ActivityLog::new();

        // when
        let result = OutcomeWaiter::from_config(&config)
            .await_outcome(&network.chain(), network.height(), &mut log)
            .await;

        // then
        assert!(result.is_ok());
    }

    #[test]
    fn target_nibble__examples() {
        let mut hash = B256::ZERO;
        assert_eq!(target_nibble(&hash), '0');
        hash.0[31] = 0xab;
        assert_eq!(target_nibble(&hash), 'b');
        hash.0[31] = 0x1f;
        assert_eq!(target_nibble(&hash), 'f');
    }

    proptest! {
        #[test]
        fn target_nibble__is_last_char_of_hex_hash(bytes in any::<[u8; 32]>()) {
            let hash = B256::from(bytes);
            let rendered = hash.to_string();
            prop_assert_eq!(Some(target_nibble(&hash)), rendered.chars().last());
        }
    }
}
