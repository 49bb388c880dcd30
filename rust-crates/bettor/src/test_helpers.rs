//! In-memory wallet and chain for exercising the betting engine.
//!
//! [`FakeNetwork`] owns the shared state; [`FakeWallet`] and [`FakeChain`] are
//! cheap views onto it. Every `block_number` query mines one block, and every
//! accepted transaction is mined immediately in a block of its own.

use crate::{
    activity_log::ActivityLog,
    claim_types::TokenClaim,
    config::BettingConfig,
    connector::{
        ChainConnector,
        Identity,
    },
    error::ProviderError,
    game_types::{
        Bet,
        GuessCounterGame,
    },
    guess::{
        ALPHABET,
        Guess,
    },
    orchestrator::StopHandle,
    outcome::target_nibble,
    rpc::{
        ChainRpc,
        MinedReceipt,
        RetryPolicy,
    },
    token_types::Erc20,
    wallet::{
        ChainDescriptor,
        WalletProvider,
    },
};
use alloy::{
    primitives::{
        Address,
        B256,
        Bytes,
        FixedBytes,
        Log,
        TxHash,
        U256,
        address,
        keccak256,
    },
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use contract_abi::test_helpers::bet_placed_log;
use deployments::NetworkDeployment;
use std::{
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};
use tokio::time::Instant;

pub const BASE_CHAIN_ID: u64 = 8453;
pub const USER: Address = address!("00000000000000000000000000000000000000aa");
pub const START_HEIGHT: u64 = 1_000;
const CLAIM_AMOUNT: u64 = 1_000;
const PAYOUT_MULTIPLIER: u64 = 12;

/// Whole tokens in base units, assuming 18 decimals.
pub fn tokens(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

/// Base mainnet settings with short retry backoff.
pub fn test_config() -> BettingConfig {
    let mut config = BettingConfig::from_deployment(&NetworkDeployment::default())
        .expect("default deployment is valid");
    config.poll_interval = Duration::from_secs(1);
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
    };
    config
}

/// Any symbol that does not match the low nibble of `hash`.
pub fn losing_guess(hash: &B256) -> Guess {
    let winning = target_nibble(hash);
    let symbol = ALPHABET
        .iter()
        .copied()
        .find(|symbol| *symbol != winning)
        .expect("alphabet has sixteen symbols");
    Guess::new(symbol).expect("alphabet symbol")
}

/// Connects a fresh wallet of `network` to Base.
pub async fn connected(network: &FakeNetwork) -> Identity<FakeWallet> {
    let config = test_config();
    ChainConnector::new(config.chain, config.switch_settle_delay)
        .establish(network.wallet(), &mut ActivityLog::new())
        .await
        .expect("fake wallet connects")
}

struct NetworkState {
    game: Address,
    token: Address,
    claim: Address,
    wait_blocks: u64,
    height: u64,
    next_tx: u64,
    receipts: HashMap<TxHash, MinedReceipt>,
    block_hashes: HashMap<u64, B256>,
    failing_block_queries: u32,
    receipts_hidden_until: Option<Instant>,

    account: Address,
    wallet_chain: u64,
    known_chains: HashSet<u64>,
    accounts_error: Option<ProviderError>,
    switch_error: Option<ProviderError>,
    switch_is_ignored: bool,
    wallet_calls: Vec<String>,
    added_chains: Vec<ChainDescriptor>,
    stop_on_wallet_query: Option<StopHandle>,

    allowance: U256,
    user_balance: U256,
    vault_balance: U256,
    reject_approvals: bool,
    claim_error: Option<String>,
    bets: BTreeMap<U256, Bet>,
    bet_counter: u64,
    place_bet_calls: usize,
    revert_place_bet: HashSet<usize>,
    stop_on_place_bet: Option<(usize, StopHandle)>,
    sent_calls: Vec<&'static str>,
}

impl NetworkState {
    fn new() -> Self {
        let config = test_config();
        Self {
            game: config.game,
            token: config.token,
            claim: config.claim,
            wait_blocks: config.wait_blocks,
            height: START_HEIGHT,
            next_tx: 0,
            receipts: HashMap::new(),
            block_hashes: HashMap::new(),
            failing_block_queries: 0,
            receipts_hidden_until: None,
            account: USER,
            wallet_chain: BASE_CHAIN_ID,
            known_chains: HashSet::from([1, 10, BASE_CHAIN_ID]),
            accounts_error: None,
            switch_error: None,
            switch_is_ignored: false,
            wallet_calls: Vec::new(),
            added_chains: Vec::new(),
            stop_on_wallet_query: None,
            allowance: U256::ZERO,
            user_balance: tokens(1_000),
            vault_balance: tokens(100_000),
            reject_approvals: false,
            claim_error: None,
            bets: BTreeMap::new(),
            bet_counter: 0,
            place_bet_calls: 0,
            revert_place_bet: HashSet::new(),
            stop_on_place_bet: None,
            sent_calls: Vec::new(),
        }
    }

    fn block_hash(&self, number: u64) -> B256 {
        self.block_hashes
            .get(&number)
            .copied()
            .unwrap_or_else(|| keccak256(format!("fake block {number}")))
    }

    fn mine(&mut self, success: bool, logs: Vec<Log>) -> TxHash {
        self.next_tx += 1;
        self.height += 1;
        let tx_hash = keccak256(format!("fake tx {}", self.next_tx));
        self.receipts.insert(
            tx_hash,
            MinedReceipt {
                tx_hash,
                block_number: self.height,
                success,
                logs,
            },
        );
        tx_hash
    }

    fn execute(&mut self, to: Address, input: &[u8]) -> Result<TxHash, ProviderError> {
        if to == self.token {
            let call = Erc20::approveCall::abi_decode(input, true)
                .map_err(|e| ProviderError::new(format!("unsupported token call: {e}")))?;
            if self.reject_approvals {
                return Err(ProviderError::user_rejected("User rejected the request."));
            }
            self.sent_calls.push("approve");
            self.allowance = call.amount;
            return Ok(self.mine(true, Vec::new()));
        }
        if to == self.claim {
            TokenClaim::claimCall::abi_decode(input, true)
                .map_err(|e| ProviderError::new(format!("unsupported claim call: {e}")))?;
            if let Some(message) = &self.claim_error {
                return Err(ProviderError::new(message.clone()));
            }
            self.sent_calls.push("claim");
            self.user_balance += tokens(CLAIM_AMOUNT);
            return Ok(self.mine(true, Vec::new()));
        }
        if to == self.game {
            if let Ok(call) = GuessCounterGame::placeBetCall::abi_decode(input, true) {
                return Ok(self.place_bet(call));
            }
            if let Ok(call) = GuessCounterGame::resolveBetCall::abi_decode(input, true) {
                return Ok(self.resolve_bet(call.betId));
            }
        }
        Err(ProviderError::new(format!("no fake contract handles a call to {to}")))
    }

    fn place_bet(&mut self, call: GuessCounterGame::placeBetCall) -> TxHash {
        self.sent_calls.push("placeBet");
        self.place_bet_calls += 1;
        if let Some((nth, handle)) = &self.stop_on_place_bet {
            if *nth == self.place_bet_calls {
                handle.stop();
            }
        }
        let funded = self.allowance >= call.amount && self.user_balance >= call.amount;
        if self.revert_place_bet.contains(&self.place_bet_calls) || !funded {
            return self.mine(false, Vec::new());
        }
        if self.allowance != U256::MAX {
            self.allowance -= call.amount;
        }
        self.user_balance -= call.amount;
        self.vault_balance += call.amount;
        self.bet_counter += 1;
        let bet_id = U256::from(self.bet_counter);
        let block_number = self.height + 1;
        self.bets.insert(
            bet_id,
            Bet {
                user: self.account,
                guess: call.guess.clone(),
                amount: call.amount,
                targetByte: FixedBytes::ZERO,
                won: false,
                reward: U256::ZERO,
                blockNumber: U256::from(block_number),
                resolved: false,
            },
        );
        let log = bet_placed_log(
            self.game,
            self.bet_counter,
            self.account,
            &call.guess,
            call.amount,
            block_number,
        );
        self.mine(true, vec![log])
    }

    fn resolve_bet(&mut self, bet_id: U256) -> TxHash {
        self.sent_calls.push("resolveBet");
        let height = self.height;
        let wait_blocks = self.wait_blocks;
        let Some(bet) = self.bets.get(&bet_id).cloned() else {
            return self.mine(false, Vec::new());
        };
        let target = u64::try_from(bet.blockNumber).unwrap_or(u64::MAX) + wait_blocks;
        if bet.resolved || height < target {
            return self.mine(false, Vec::new());
        }
        let nibble = target_nibble(&self.block_hash(target));
        let won = bet.guess.chars().eq([nibble]);
        let reward = if won {
            bet.amount * U256::from(PAYOUT_MULTIPLIER)
        } else {
            U256::ZERO
        };
        if won {
            self.vault_balance = self.vault_balance.saturating_sub(reward);
            self.user_balance += reward;
        }
        self.bets.insert(
            bet_id,
            Bet {
                targetByte: FixedBytes([nibble as u8]),
                won,
                reward,
                resolved: true,
                ..bet
            },
        );
        self.mine(true, Vec::new())
    }

    fn view(&self, to: Address, input: &[u8]) -> Result<Bytes, ProviderError> {
        let unsupported = || ProviderError::new(format!("execution reverted: no view at {to}"));
        if to == self.token {
            if Erc20::allowanceCall::abi_decode(input, true).is_ok() {
                return Ok(Erc20::allowanceCall::abi_encode_returns(&(self.allowance,)).into());
            }
            if let Ok(call) = Erc20::balanceOfCall::abi_decode(input, true) {
                let balance = if call.owner == self.game {
                    self.vault_balance
                } else {
                    self.user_balance
                };
                return Ok(Erc20::balanceOfCall::abi_encode_returns(&(balance,)).into());
            }
        }
        if to == self.game {
            if let Ok(call) = GuessCounterGame::getBetCall::abi_decode(input, true) {
                let bet = self.bets.get(&call.betId).cloned().unwrap_or(Bet {
                    user: Address::ZERO,
                    guess: String::new(),
                    amount: U256::ZERO,
                    targetByte: FixedBytes::ZERO,
                    won: false,
                    reward: U256::ZERO,
                    blockNumber: U256::ZERO,
                    resolved: false,
                });
                return Ok(GuessCounterGame::getBetCall::abi_encode_returns(&(bet,)).into());
            }
            if GuessCounterGame::betCounterCall::abi_decode(input, true).is_ok() {
                let counter = U256::from(self.bet_counter);
                return Ok(GuessCounterGame::betCounterCall::abi_encode_returns(&(counter,)).into());
            }
        }
        Err(unsupported())
    }
}

/// Shared state of a simulated Base network, its contracts and one wallet.
#[derive(Clone)]
pub struct FakeNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().expect("fake network poisoned")
    }

    pub fn wallet(&self) -> FakeWallet {
        FakeWallet {
            state: self.state.clone(),
        }
    }

    pub fn chain(&self) -> FakeChain {
        FakeChain {
            state: self.state.clone(),
        }
    }

    pub fn height(&self) -> u64 {
        self.state().height
    }

    pub fn block_hash_at(&self, number: u64) -> B256 {
        self.state().block_hash(number)
    }

    pub fn set_block_hash(&self, number: u64, hash: B256) {
        self.state().block_hashes.insert(number, hash);
    }

    /// The next `count` block queries fail as if the RPC were down.
    pub fn fail_block_queries(&self, count: u32) {
        self.state().failing_block_queries = count;
    }

    /// Receipts stay unavailable for `delay`, as on a congested node.
    pub fn withhold_receipts_for(&self, delay: Duration) {
        self.state().receipts_hidden_until = Some(Instant::now() + delay);
    }

    pub fn put_wallet_on_chain(&self, chain_id: u64) {
        self.state().wallet_chain = chain_id;
    }

    pub fn forget_chain(&self, chain_id: u64) {
        self.state().known_chains.remove(&chain_id);
    }

    pub fn switch_account(&self, account: Address) {
        self.state().account = account;
    }

    pub fn reject_accounts_with(&self, err: ProviderError) {
        self.state().accounts_error = Some(err);
    }

    pub fn reject_switch_with(&self, err: ProviderError) {
        self.state().switch_error = Some(err);
    }

    /// The wallet acknowledges switch requests but stays where it is.
    pub fn ignore_switch_requests(&self) {
        self.state().switch_is_ignored = true;
    }

    pub fn reject_approvals(&self) {
        self.state().reject_approvals = true;
    }

    pub fn reject_claims(&self, message: &str) {
        self.state().claim_error = Some(message.to_string());
    }

    /// The `nth` (1-based) `placeBet` transaction reverts.
    pub fn revert_place_bet(&self, nth: usize) {
        self.state().revert_place_bet.insert(nth);
    }

    /// Requests a stop as the `nth` (1-based) `placeBet` is sent.
    pub fn stop_on_place_bet(&self, nth: usize, handle: StopHandle) {
        self.state().stop_on_place_bet = Some((nth, handle));
    }

    /// Requests a stop the first time the wallet's accounts are queried.
    pub fn stop_on_wallet_query(&self, handle: StopHandle) {
        self.state().stop_on_wallet_query = Some(handle);
    }

    pub fn set_allowance(&self, allowance: U256) {
        self.state().allowance = allowance;
    }

    pub fn allowance(&self) -> U256 {
        self.state().allowance
    }

    pub fn set_user_balance(&self, balance: U256) {
        self.state().user_balance = balance;
    }

    pub fn user_balance(&self) -> U256 {
        self.state().user_balance
    }

    pub fn set_vault_balance(&self, balance: U256) {
        self.state().vault_balance = balance;
    }

    pub fn wallet_calls(&self) -> Vec<String> {
        self.state().wallet_calls.clone()
    }

    pub fn added_chains(&self) -> Vec<ChainDescriptor> {
        self.state().added_chains.clone()
    }

    /// Contract functions of accepted transactions, in order.
    pub fn sent_calls(&self) -> Vec<&'static str> {
        self.state().sent_calls.clone()
    }

    pub fn placed_guesses(&self) -> Vec<String> {
        self.state()
            .bets
            .values()
            .map(|bet| bet.guess.clone())
            .collect()
    }

    pub fn bet(&self, bet_id: U256) -> Option<Bet> {
        self.state().bets.get(&bet_id).cloned()
    }
}

pub struct FakeWallet {
    state: Arc<Mutex<NetworkState>>,
}

impl FakeWallet {
    fn record(&self, method: &str) -> MutexGuard<'_, NetworkState> {
        let mut state = self.state.lock().expect("fake network poisoned");
        state.wallet_calls.push(method.to_string());
        state
    }
}

impl WalletProvider for FakeWallet {
    fn name(&self) -> &str {
        "Fake Wallet"
    }

    async fn request_accounts(&mut self) -> Result<Vec<Address>, ProviderError> {
        let state = self.record("eth_requestAccounts");
        match &state.accounts_error {
            Some(err) => Err(err.clone()),
            None => Ok(vec![state.account]),
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let mut state = self.record("eth_accounts");
        if let Some(handle) = state.stop_on_wallet_query.take() {
            handle.stop();
        }
        Ok(vec![state.account])
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.record("eth_chainId").wallet_chain)
    }

    async fn switch_chain(&mut self, chain_id_hex: &str) -> Result<(), ProviderError> {
        let mut state = self.record("wallet_switchEthereumChain");
        if let Some(err) = &state.switch_error {
            return Err(err.clone());
        }
        let chain_id = crate::wallet::parse_chain_id_hex(chain_id_hex)?;
        if !state.known_chains.contains(&chain_id) {
            return Err(ProviderError::unrecognized_chain(chain_id_hex));
        }
        if !state.switch_is_ignored {
            state.wallet_chain = chain_id;
        }
        Ok(())
    }

    async fn add_chain(&mut self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        let mut state = self.record("wallet_addEthereumChain");
        state.known_chains.insert(chain.chain_id_number);
        state.added_chains.push(chain.clone());
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError> {
        let mut state = self.record("eth_sendTransaction");
        if let Some(chain_id) = tx.chain_id {
            if chain_id != state.wallet_chain {
                return Err(ProviderError::new(format!(
                    "chainId {chain_id} does not match the wallet network {}",
                    state.wallet_chain
                )));
            }
        }
        let to = tx
            .to
            .and_then(|kind| kind.to().copied())
            .ok_or_else(|| ProviderError::new("contract creation is not supported"))?;
        let input = tx.input.input().cloned().unwrap_or_default();
        state.execute(to, &input)
    }
}

pub struct FakeChain {
    state: Arc<Mutex<NetworkState>>,
}

impl FakeChain {
    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().expect("fake network poisoned")
    }

    fn block_query(&self) -> Result<MutexGuard<'_, NetworkState>, ProviderError> {
        let mut state = self.state();
        if state.failing_block_queries > 0 {
            state.failing_block_queries -= 1;
            return Err(ProviderError::new("connection refused"));
        }
        Ok(state)
    }
}

impl ChainRpc for FakeChain {
    async fn block_number(&self) -> Result<u64, ProviderError> {
        let mut state = self.block_query()?;
        state.height += 1;
        Ok(state.height)
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, ProviderError> {
        let state = self.block_query()?;
        Ok((number <= state.height).then(|| state.block_hash(number)))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ProviderError> {
        self.state().view(to, &input)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<MinedReceipt>, ProviderError> {
        let state = self.state();
        if state
            .receipts_hidden_until
            .is_some_and(|until| Instant::now() < until)
        {
            return Ok(None);
        }
        Ok(state.receipts.get(&tx_hash).cloned())
    }
}
