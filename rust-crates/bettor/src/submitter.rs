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
    find_bet_placed,
    game_types::GuessCounterGame,
    guess::BetRequest,
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
        U256,
    },
    sol_types::SolCall,
};

/// A bet the game contract accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedBet {
    pub bet_id: U256,
    /// Block number recorded by the contract in its `BetPlaced` event.
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub amount: U256,
}

pub struct BetSubmitter {
    game: Address,
    chain_id: u64,
    watcher: ReceiptWatcher,
}

impl BetSubmitter {
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

    pub async fn submit<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        request: &BetRequest,
        log: &mut ActivityLog,
    ) -> Result<PlacedBet> {
        match self.place(identity, chain, request, log).await {
            Ok(placed) => {
                log.push(LogKind::BetPlaced {
                    bet_id: placed.bet_id,
                    block_number: placed.block_number,
                });
                Ok(placed)
            }
            Err(err) => {
                let err = Error::Submission {
                    reason: err.to_string(),
                };
                tracing::warn!(%err, guess = %request.guess, "bet not placed");
                log.message(err.to_string());
                Err(err)
            }
        }
    }

    async fn place<W: WalletProvider, C: ChainRpc>(
        &self,
        identity: &Identity<W>,
        chain: &C,
        request: &BetRequest,
        log: &mut ActivityLog,
    ) -> std::result::Result<PlacedBet, ProviderError> {
        let call = GuessCounterGame::placeBetCall {
            guess: request.guess.to_string(),
            amount: request.amount,
        };
        let tx = contract_call(identity.address, self.game, self.chain_id, call.abi_encode());
        let tx_hash = identity.signer.send_transaction(tx).await?;
        log.tx_issued("Placing bet...", tx_hash);

        let receipt = wait_successful(&self.watcher, chain, tx_hash).await?;
        let event = find_bet_placed(self.game, &receipt.logs).ok_or_else(|| {
            ProviderError::new(format!("transaction {tx_hash} emitted no BetPlaced event"))
        })?;
        let block_number = u64::try_from(event.blockNumber).map_err(|_| {
            ProviderError::new(format!("bet block {} out of range", event.blockNumber))
        })?;
        tracing::info!(bet_id = %event.betId, block = block_number, %tx_hash, "bet accepted");
        Ok(PlacedBet {
            bet_id: event.betId,
            block_number,
            tx_hash,
            amount: event.amount,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        guess::Guess,
        test_helpers::{
            FakeNetwork,
            connected,
            test_config,
            tokens,
        },
    };
    use std::time::Duration;

    fn request(symbol: char) -> BetRequest {
        BetRequest {
            guess: Guess::new(symbol).unwrap(),
            amount: tokens(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submit__accepted__logs_contract_bet_id_and_block() {
        // given
        let network = FakeNetwork::new();
        network.set_allowance(U256::MAX);
        let config = test_config();
        let identity = connected(&network).await;
        let mut log = ActivityLog::new();

        // when
        let placed = BetSubmitter::from_config(&config)
            .submit(&identity, &network.chain(), &request('c'), &mut log)
            .await
            .unwrap();

        // then
        assert_eq!(placed.bet_id, U256::from(1u64));
        assert_eq!(placed.block_number, network.height());
        assert_eq!(placed.amount, tokens(100));
        assert_eq!(network.placed_guesses(), vec!["c".to_string()]);
        assert!(matches!(
            log.entries()[0].kind,
            LogKind::TransactionIssued { tx_hash, .. } if tx_hash == placed.tx_hash
        ));
        assert_eq!(
            log.entries()[1].kind,
            LogKind::BetPlaced {
                bet_id: placed.bet_id,
                block_number: placed.block_number,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn submit__reverted__fails_with_single_message() {
        // given
        let network = FakeNetwork::new();
        network.set_allowance(U256::MAX);
        network.revert_place_bet(1);
        let config = test_config();
        let identity = connected(&network).await;
        let mut log = ActivityLog::new();

        // when
        let result = BetSubmitter::from_config(&config)
            .submit(&identity, &network.chain(), &request('0'), &mut log)
            .await;

        // then
        assert!(matches!(result, Err(Error::Submission { .. })));
        let messages: Vec<_> = log.plain_messages().collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Place bet failed: transaction"));
        assert!(messages[0].contains("reverted"));
    }

    #[tokio::test(start_paused = true)]
    async fn submit__receipt_delayed_past_two_minutes__keeps_waiting_for_the_bet() {
        // given
        let network = FakeNetwork::new();
        network.set_allowance(U256::MAX);
        let config = test_config();
        let identity = connected(&network).await;
        network.withhold_receipts_for(Duration::from_secs(130));
        let mut log = ActivityLog::new();
        let started = tokio::time::Instant::now();

        // when
        let placed = BetSubmitter::from_config(&config)
            .submit(&identity, &network.chain(), &request('7'), &mut log)
            .await
            .unwrap();

        // then
        assert!(started.elapsed() >= Duration::from_secs(130));
        assert_eq!(placed.bet_id, U256::from(1u64));
        assert_eq!(log.plain_messages().count(), 0);
        assert!(matches!(log.entries()[1].kind, LogKind::BetPlaced { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn submit__wallet_on_other_network__is_refused_by_the_wallet() {
        // given
        let network = FakeNetwork::new();
        network.set_allowance(U256::MAX);
        let config = test_config();
        let identity = connected(&network).await;
        network.put_wallet_on_chain(1);
        let mut log = ActivityLog::new();

        // when
        let result = BetSubmitter::from_config(&config)
            .submit(&identity, &network.chain(), &request('7'), &mut log)
            .await;

        // then
        assert!(matches!(result, Err(Error::Submission { .. })));
        assert!(network.sent_calls().is_empty());
        assert_eq!(
            log.plain_messages().collect::<Vec<_>>(),
            vec!["Place bet failed: chainId 8453 does not match the wallet network 1"]
        );
    }
}
