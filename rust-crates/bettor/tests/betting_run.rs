#![allow(non_snake_case)]

use base_bettor::{
    Error,
    ProviderError,
    activity_log::LogKind,
    guess::{
        Guess,
        GuessMode,
    },
    orchestrator::{
        BetStatus,
        BettingOrchestrator,
    },
    test_helpers::*,
};
use alloy::primitives::{
    B256,
    U256,
};
use proptest::prelude::*;
use std::time::Duration;
use tokio::runtime::{
    Builder,
    Runtime,
};

async fn orchestrator(network: &FakeNetwork) -> BettingOrchestrator<FakeWallet, FakeChain> {
    let mut orchestrator =
        BettingOrchestrator::new(&test_config(), network.chain()).with_rng_seed(42);
    orchestrator.connect_with(network.wallet()).await.unwrap();
    orchestrator
}

fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn run__stop_before_first_iteration__places_no_bets() {
    // given
    let network = FakeNetwork::new();
    let mut orchestrator = orchestrator(&network).await;
    network.stop_on_wallet_query(orchestrator.stop_handle());

    // when
    let summary = orchestrator
        .run(3, GuessMode::Random, tokens(10))
        .await
        .unwrap();

    // then
    assert!(summary.stopped);
    assert_eq!(summary.iterations, 0);
    assert!(orchestrator.records().is_empty());
    assert!(network.sent_calls().is_empty());
    let state = orchestrator.state();
    assert!(!state.running);
    assert!(!state.stop_requested);
}

#[tokio::test(start_paused = true)]
async fn run__stop_mid_run__finishes_in_flight_bet_then_stops() {
    // given
    let network = FakeNetwork::new();
    let mut orchestrator = orchestrator(&network).await;
    network.stop_on_place_bet(2, orchestrator.stop_handle());

    // when
    let summary = orchestrator
        .run(5, GuessMode::Random, tokens(10))
        .await
        .unwrap();

    // then
    assert!(summary.stopped);
    assert_eq!(summary.iterations, 2);
    assert_eq!(orchestrator.records().len(), 2);
    assert!(
        orchestrator
            .records()
            .iter()
            .all(|record| record.status().is_terminal())
    );
    assert_eq!(
        network.sent_calls(),
        vec!["approve", "placeBet", "resolveBet", "placeBet", "resolveBet"]
    );
    assert!(!orchestrator.state().running);
}

#[tokio::test(start_paused = true)]
async fn run__reverted_submission__skips_bet_and_continues() {
    // given
    let network = FakeNetwork::new();
    network.set_allowance(U256::MAX);
    network.revert_place_bet(1);
    let mut orchestrator = orchestrator(&network).await;
    let logged_before = orchestrator.log().len();

    // when
    let summary = orchestrator
        .run(3, GuessMode::Random, tokens(10))
        .await
        .unwrap();

    // then
    assert_eq!(summary.iterations, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(orchestrator.records().len(), 2);
    let failures: Vec<_> = orchestrator.log().entries()[logged_before..]
        .iter()
        .filter_map(|entry| match &entry.kind {
            LogKind::PlainMessage { message } if message.starts_with("Place bet failed") => {
                Some(message)
            }
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn run__matching_guess__wins_twelve_times_the_bet() {
    // given
    let network = FakeNetwork::new();
    network.set_allowance(U256::MAX);
    let bet_block = START_HEIGHT + 1;
    let mut hash = B256::repeat_byte(0x11);
    hash.0[31] = 0x3c;
    network.set_block_hash(bet_block + 4, hash);
    let mut orchestrator = orchestrator(&network).await;

    // when
    let summary = orchestrator
        .run(1, GuessMode::Manual(Guess::new('c').unwrap()), tokens(10))
        .await
        .unwrap();

    // then
    assert_eq!(summary.won, 1);
    let record = &orchestrator.records()[0];
    assert_eq!(record.block_number, bet_block);
    assert_eq!(record.status(), BetStatus::Won);
    let bet = network.bet(record.bet_id).unwrap();
    assert!(bet.resolved && bet.won);
    assert_eq!(bet.reward, tokens(120));
    assert!(orchestrator.log().entries().iter().any(|entry| matches!(
        &entry.kind,
        LogKind::BlockInfo { block_number, target_byte: 'c', .. } if *block_number == bet_block + 4
    )));
}

#[tokio::test(start_paused = true)]
async fn connect__wallet_without_base__adds_chain_and_bets() {
    // given
    let network = FakeNetwork::new();
    network.put_wallet_on_chain(1);
    network.forget_chain(BASE_CHAIN_ID);
    let mut orchestrator: BettingOrchestrator<FakeWallet, FakeChain> =
        BettingOrchestrator::new(&test_config(), network.chain());

    // when
    orchestrator.connect_with(network.wallet()).await.unwrap();
    let summary = orchestrator
        .run(1, GuessMode::Random, tokens(1))
        .await
        .unwrap();

    // then
    assert_eq!(orchestrator.identity().unwrap().chain_id, BASE_CHAIN_ID);
    assert!(
        orchestrator
            .log()
            .plain_messages()
            .any(|message| message == "Successfully switched to Base!")
    );
    assert_eq!(summary.won + summary.lost, 1);
}

#[tokio::test(start_paused = true)]
async fn run__subscriber__sees_every_entry_in_order() {
    // given
    let network = FakeNetwork::new();
    let mut orchestrator = orchestrator(&network).await;
    let mut rx = orchestrator.log_mut().subscribe();
    let logged_before = orchestrator.log().len();

    // when
    orchestrator
        .run(2, GuessMode::Random, tokens(5))
        .await
        .unwrap();

    // then
    let mut received = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        received.push(entry);
    }
    assert_eq!(received.as_slice(), &orchestrator.log().entries()[logged_before..]);
    let results = received
        .iter()
        .filter(|entry| matches!(entry.kind, LogKind::Result { .. }))
        .count();
    assert_eq!(results, 2);
}

#[tokio::test(start_paused = true)]
async fn run__account_changed__halts_and_drops_identity() {
    // given
    let network = FakeNetwork::new();
    let mut orchestrator = orchestrator(&network).await;
    network.switch_account(alloy::primitives::Address::repeat_byte(0xbb));

    // when
    let result = orchestrator.run(1, GuessMode::Random, tokens(1)).await;

    // then
    assert!(matches!(result, Err(Error::IdentityLost { .. })));
    assert!(orchestrator.identity().is_none());
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 10, .. ProptestConfig::default() })]
    #[test]
    fn run__random_mode__plays_exactly_num_bets(num_bets in 1u64..=4, seed in any::<u64>()) {
        let rt = paused_runtime();
        rt.block_on(async {
            let network = FakeNetwork::new();
            let mut orchestrator =
                BettingOrchestrator::new(&test_config(), network.chain()).with_rng_seed(seed);
            orchestrator.connect_with(network.wallet()).await.unwrap();

            let summary = orchestrator
                .run(num_bets, GuessMode::Random, tokens(1))
                .await
                .unwrap();

            assert_eq!(summary.iterations, num_bets);
            assert_eq!(summary.won + summary.lost, num_bets);
            assert_eq!(network.placed_guesses().len() as u64, num_bets);
            assert_eq!(
                network.sent_calls().iter().filter(|call| **call == "approve").count(),
                1
            );
        });
    }
}

#[tokio::test(start_paused = true)]
async fn run__bet_receipt_slow_to_appear__still_records_and_resolves_the_bet() {
    // given
    let network = FakeNetwork::new();
    network.set_allowance(U256::MAX);
    let mut orchestrator = orchestrator(&network).await;
    network.withhold_receipts_for(Duration::from_secs(130));

    // when
    let summary = orchestrator
        .run(1, GuessMode::Random, tokens(10))
        .await
        .unwrap();

    // then
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.won + summary.lost, 1);
    assert_eq!(orchestrator.records().len(), 1);
    assert!(orchestrator.records()[0].status().is_terminal());
    assert!(network.bet(U256::from(1u64)).unwrap().resolved);
}

#[tokio::test(start_paused = true)]
async fn run__wallet_left_on_other_network__sends_no_transactions() {
    // given
    let network = FakeNetwork::new();
    network.put_wallet_on_chain(1);
    network.reject_switch_with(ProviderError::user_rejected("User rejected the request."));
    let mut orchestrator: BettingOrchestrator<FakeWallet, FakeChain> =
        BettingOrchestrator::new(&test_config(), network.chain());
    orchestrator.connect_with(network.wallet()).await.unwrap();

    // when
    let summary = orchestrator
        .run(2, GuessMode::Random, tokens(10))
        .await
        .unwrap();

    // then
    assert_eq!(orchestrator.identity().unwrap().chain_id, 1);
    assert_eq!(summary.failed, 2);
    assert!(orchestrator.records().is_empty());
    assert!(network.sent_calls().is_empty());
    assert!(
        orchestrator
            .log()
            .plain_messages()
            .any(|m| m == "Approval failed: chainId 8453 does not match the wallet network 1")
    );
}
