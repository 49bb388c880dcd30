use crate::{
    activity_log::{
        ActivityLog,
        LogKind,
    },
    config::BettingConfig,
    connector::Identity,
    error::{
        Error,
        ProviderError,
        Result,
    },
    game_types::GuessCounterGame,
    rpc::{
        ChainRpc,
        call_view,
        with_retry,
    },
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

/// Settlement of a bet as reported by the game contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub won: bool,
    pub reward: U256,
    pub tx_hash: TxHash,
}

/// Asks the contract to settle a bet and reads back its verdict.
pub struct ResolutionTrigger {
    game: Address,
    chain_id: u64,
    watcher: ReceiptWatcher,
}

impl ResolutionTrigger {
    pub fn new(game: Address, chain_id: u64, watcher: ReceiptWatcher) -> Self {
        Self {
            game,
            chain_id,
            watcher,
        }
    }

    pub fn from_config(config: &BettingConfig) -> Self {
        Self::new(
            config.game,
            config.chain.chain_id_number,
            config.receipt_watcher(),
        )
    }

    pub async fn resolve<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        bet_id: U256,
        log: &mut ActivityLog,
    ) -> Result<Resolution> {
        match self.settle(identity, chain, bet_id, log).await {
            Ok(resolution) => {
                let won = resolution.won;
                log.push(LogKind::Result {
                    bet_id,
                    won,
                    reward: won.then_some(resolution.reward),
                    tx_hash: won.then_some(resolution.tx_hash),
                });
                Ok(resolution)
            }
            Err(err) => {
                let err = Error::Resolution {
                    reason: err.to_string(),
                };
                tracing::warn!(%err, %bet_id, "bet not resolved");
                log.message(err.to_string());
                Err(err)
            }
        }
    }

    async fn settle<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        bet_id: U256,
        log: &mut ActivityLog,
    ) -> std::result::Result<Resolution, ProviderError> {
        let call = GuessCounterGame::resolveBetCall { betId: bet_id };
        let tx = contract_call(identity.address, self.game, self.chain_id, call.abi_encode());
        let tx_hash = identity.signer.send_transaction(tx).await?;
        log.tx_issued(format!("Resolving bet {bet_id}..."), tx_hash);
        wait_successful(&self.watcher, chain, tx_hash).await?;

        let get_bet = GuessCounterGame::getBetCall { betId: bet_id };
        let bet = with_retry(&self.watcher.retry, "getBet", || {
            call_view(chain, self.game, &get_bet)
        })
        .await?
        ._0;
        if !bet.resolved {
            return Err(ProviderError::new(format!(
                "bet {bet_id} still unresolved after {tx_hash}"
            )));
        }
        tracing::info!(%bet_id, won = bet.won, reward = %bet.reward, "bet settled");
        Ok(Resolution {
            won: bet.won,
            reward: bet.reward,
            tx_hash,
        })
    }
}
