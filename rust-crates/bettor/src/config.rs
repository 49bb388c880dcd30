use crate::{
    error::{
        Error,
        Result,
    },
    rpc::RetryPolicy,
    transactions::ReceiptWatcher,
    wallet::ChainDescriptor,
};
use alloy::primitives::Address;
use deployments::NetworkDeployment;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime settings of the betting engine, derived from a deployment record.
#[derive(Clone, Debug)]
pub struct BettingConfig {
    pub chain: ChainDescriptor,
    pub game: Address,
    pub token: Address,
    pub claim: Address,
    pub token_decimals: u8,
    pub wait_blocks: u64,
    pub poll_interval: Duration,
    pub approval_cooldown: Duration,
    pub switch_settle_delay: Duration,
    pub retry: RetryPolicy,
}

impl BettingConfig {
    pub fn from_deployment(deployment: &NetworkDeployment) -> Result<Self> {
        Ok(Self {
            chain: ChainDescriptor::from_deployment(deployment),
            game: parse_address("game_contract", &deployment.game_contract)?,
            token: parse_address("token_contract", &deployment.token_contract)?,
            claim: parse_address("claim_contract", &deployment.claim_contract)?,
            token_decimals: deployment.token_decimals,
            wait_blocks: deployment.wait_blocks,
            poll_interval: DEFAULT_POLL_INTERVAL,
            approval_cooldown: Duration::from_millis(deployment.approval_cooldown_ms),
            switch_settle_delay: Duration::from_millis(deployment.switch_settle_ms),
            retry: RetryPolicy::default(),
        })
    }

    pub fn receipt_watcher(&self) -> ReceiptWatcher {
        ReceiptWatcher {
            poll_interval: self.poll_interval,
            retry: self.retry,
        }
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address> {
    raw.parse().map_err(|e| Error::Config {
        reason: format!("{field} {raw:?} is not an address: {e}"),
    })
}
