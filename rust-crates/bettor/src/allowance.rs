use crate::{
    activity_log::ActivityLog,
    config::BettingConfig,
    connector::Identity,
    error::{
        Error,
        ProviderError,
        Result,
    },
    rpc::{
        ChainRpc,
        call_view,
    },
    token_types::Erc20,
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
        U256,
    },
    sol_types::SolCall,
};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllowanceOutcome {
    Sufficient,
    Approved { tx_hash: TxHash },
}

/// Makes sure the spender may pull at least the bet amount from the owner.
///
/// Approvals are always for `U256::MAX`, so across a run at most one approval
/// transaction is sent.
pub struct AllowanceGuard {
    token: Address,
    chain_id: u64,
    watcher: ReceiptWatcher,
    cooldown: Duration,
}

impl AllowanceGuard {
    pub fn new(
        token: Address,
        chain_id: u64,
        watcher: ReceiptWatcher,
        cooldown: Duration,
    ) -> Self {
        Self {
            token,
            chain_id,
            watcher,
            cooldown,
        }
    }

    pub fn from_config(config: &BettingConfig) -> Self {
        Self::new(
            config.token,
            config.chain.chain_id_number,
            config.receipt_watcher(),
            config.approval_cooldown,
        )
    }

    pub async fn ensure_allowance<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        spender: Address,
        required: U256,
        log: &mut ActivityLog,
    ) -> Result<AllowanceOutcome> {
        match self.approve_if_needed(identity, chain, spender, required, log).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let err = Error::Allowance {
                    reason: err.to_string(),
                };
                tracing::warn!(%err, "allowance not secured");
                log.message(err.to_string());
                Err(err)
            }
        }
    }

    async fn approve_if_needed<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        spender: Address,
        required: U256,
        log: &mut ActivityLog,
    ) -> std::result::Result<AllowanceOutcome, ProviderError> {
        let current = call_view(
            chain,
            self.token,
            &Erc20::allowanceCall {
                owner: identity.address,
                spender,
            },
        )
        .await?
        ._0;
        if current >= required {
            tracing::debug!(%current, %required, "allowance sufficient");
            return Ok(AllowanceOutcome::Sufficient);
        }

        let approve = Erc20::approveCall {
            spender,
            amount: U256::MAX,
        };
        let tx = contract_call(identity.address, self.token, self.chain_id, approve.abi_encode());
        let tx_hash = identity.signer.send_transaction(tx).await?;
        log.tx_issued("Approving tokens...", tx_hash);

        wait_successful(&self.watcher, chain, tx_hash).await?;
        tracing::info!(%tx_hash, %spender, "approval mined");
        tokio::time::sleep(self.cooldown).await;
        Ok(AllowanceOutcome::Approved { tx_hash })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        activity_log::LogKind,
        test_helpers::{
            FakeNetwork,
            connected,
            test_config,
            tokens,
        },
    };

    #[tokio::test(start_paused = true)]
    async fn ensure_allowance__insufficient__approves_max_once() {
        // given
        let network = FakeNetwork::new();
        let config = test_config();
        let guard = AllowanceGuard::from_config(&config);
        let identity = connected(&network).await;
        let mut log = ActivityLog::new();

        // when
        let first = guard
            .ensure_allowance(&identity, &network.chain(), config.game, tokens(100), &mut log)
            .await
            .unwrap();
        let second = guard
            .ensure_allowance(&identity, &network.chain(), config.game, tokens(100), &mut log)
            .await
            .unwrap();

        // then
        assert!(matches!(first, AllowanceOutcome::Approved { .. }));
        assert_eq!(second, AllowanceOutcome::Sufficient);
        assert_eq!(network.sent_calls(), vec!["approve"]);
        assert_eq!(network.allowance(), U256::MAX);
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log.entries()[0].kind,
            LogKind::TransactionIssued { message, .. } if message == "Approving tokens..."
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_allowance__sufficient__sends_nothing_and_logs_nothing() {
        // given
        let network = FakeNetwork::new();
        network.set_allowance(tokens(500));
        let config = test_config();
        let identity = connected(&network).await;
        let mut log = ActivityLog::new();

        // when
        let outcome = AllowanceGuard::from_config(&config)
            .ensure_allowance(&identity, &network.chain(), config.game, tokens(500), &mut log)
            .await
            .unwrap();

        // then
        assert_eq!(outcome, AllowanceOutcome::Sufficient);
        assert!(network.sent_calls().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_allowance__rejected__reports_allowance_error() {
        // given
        let network = FakeNetwork::new();
        network.reject_approvals();
        let config = test_config();
        let identity = connected(&network).await;
        let mut log = ActivityLog::new();

        // when
        let result = AllowanceGuard::from_config(&config)
            .ensure_allowance(&identity, &network.chain(), config.game, tokens(1), &mut log)
            .await;

        // then
        assert!(matches!(result, Err(Error::Allowance { .. })));
        assert_eq!(
            log.plain_messages().collect::<Vec<_>>(),
            vec!["Approval failed: User rejected the request."]
        );
    }
}
