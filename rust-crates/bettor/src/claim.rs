use crate::{
    activity_log::ActivityLog,
    claim_types::TokenClaim,
    config::BettingConfig,
    connector::Identity,
    error::{
        Error,
        ProviderError,
        Result,
    },
    rpc::ChainRpc,
    transactions::{
        ReceiptWatcher,
        contract_call,
        wait_successful,
    },
    wallet::WalletProvider,
};
use alloy::{
    primitives::{
        Address,
        TxHash,
    },
    sol_types::SolCall,
};

/// Requests free tokens from the faucet contract.
pub struct TokenClaimer {
    claim: Address,
    chain_id: u64,
    watcher: ReceiptWatcher,
}

impl TokenClaimer {
    pub fn from_config(config: &BettingConfig) -> Self {
        Self {
            claim: config.claim,
            chain_id: config.chain.chain_id_number,
            watcher: config.receipt_watcher(),
        }
    }

    pub async fn claim<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: Option<&Identity<W>>,
        chain: &C,
        log: &mut ActivityLog,
    ) -> Result<TxHash> {
        let Some(identity) = identity else {
            log.message(Error::NotConnected.to_string());
            return Err(Error::NotConnected);
        };
        match self.send_claim(identity, chain, log).await {
            Ok(tx_hash) => Ok(tx_hash),
            Err(err) => {
                let err = Error::Claim {
                    reason: err.to_string(),
                };
                tracing::warn!(%err, "claim failed");
                log.message(err.to_string());
                Err(err)
            }
        }
    }

    async fn send_claim<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        log: &mut ActivityLog,
    ) -> std::result::Result<TxHash, ProviderError> {
        let tx = contract_call(
            identity.address,
            self.claim,
            self.chain_id,
            TokenClaim::claimCall {}.abi_encode(),
        );
        let tx_hash = identity.signer.send_transaction(tx).await?;
        log.tx_issued("Claiming tokens...", tx_hash);
        wait_successful(&self.watcher, chain, tx_hash).await?;
        tracing::info!(%tx_hash, "tokens claimed");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        FakeNetwork,
        FakeWallet,
        connected,
        test_config,
        tokens,
    };

    #[tokio::test(start_paused = true)]
    async fn claim__connected__credits_tokens() {
        // given
        let network = FakeNetwork::new();
        let identity = connected(&network).await;
        let before = network.user_balance();
        let mut log = ActivityLog::new();

        // when
        let result = TokenClaimer::from_config(&test_config())
            .claim(Some(&identity), &network.chain(), &mut log)
            .await;

        // then
        assert!(result.is_ok());
        assert_eq!(network.user_balance(), before + tokens(1_000));
        assert_eq!(network.sent_calls(), vec!["claim"]);
    }

    #[tokio::test(start_paused = true)]
    async fn claim__not_connected__asks_to_connect_first() {
        // given
        let network = FakeNetwork::new();
        let mut log = ActivityLog::new();

        // when
        let result = TokenClaimer::from_config(&test_config())
            .claim(None::<&Identity<FakeWallet>>, &network.chain(), &mut log)
            .await;

        // then
        assert_eq!(result, Err(Error::NotConnected));
        assert_eq!(
            log.plain_messages().collect::<Vec<_>>(),
            vec!["Connect wallet first."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn claim__already_claimed__reports_claim_failure() {
        // given
        let network = FakeNetwork::new();
        network.reject_claims("execution reverted: already claimed");
        let identity = connected(&network).await;
        let mut log = ActivityLog::new();

        // when
        let result = TokenClaimer::from_config(&test_config())
            .claim(Some(&identity), &network.chain(), &mut log)
            .await;

        // then
        assert!(matches!(result, Err(Error::Claim { .. })));
        assert_eq!(
            log.plain_messages().collect::<Vec<_>>(),
            vec!["Claim failed: execution reverted: already claimed"]
        );
    }
}
