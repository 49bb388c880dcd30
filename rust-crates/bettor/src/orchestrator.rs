//! Sequential betting loop.
//!
//! One bet is in flight at a time. Each iteration runs allowance, submission,
//! block wait and resolution in order; a failing stage ends only its own
//! iteration, while losing the wallet identity ends the run. Cancellation is
//! cooperative through a [`StopHandle`] polled between iterations.

use crate::{
    activity_log::ActivityLog,
    allowance::AllowanceGuard,
    config::BettingConfig,
    connector::{
        ChainConnector,
        Identity,
    },
    error::{
        Error,
        Result,
    },
    guess::{
        BetRequest,
        Guess,
        GuessMode,
    },
    outcome::OutcomeWaiter,
    resolution::ResolutionTrigger,
    rpc::ChainRpc,
    submitter::{
        BetSubmitter,
        PlacedBet,
    },
    wallet::{
        AnyWallet,
        ProviderKind,
        WalletProvider,
    },
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::sync::{
    Arc,
    atomic::{
        AtomicBool,
        Ordering,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    Approving,
    Submitting,
    Waiting,
    Resolving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetStatus {
    Submitted,
    AwaitingBlocks,
    Resolving,
    Won,
    Lost,
    Failed,
}

impl BetStatus {
    fn rank(self) -> u8 {
        match self {
            BetStatus::Submitted => 0,
            BetStatus::AwaitingBlocks => 1,
            BetStatus::Resolving => 2,
            BetStatus::Won | BetStatus::Lost | BetStatus::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }
}

/// A bet the contract accepted, and how far it has progressed since.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetRecord {
    pub bet_id: U256,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub amount: U256,
    pub guess: Guess,
    status: BetStatus,
}

impl BetRecord {
    fn submitted(placed: &PlacedBet, guess: Guess) -> Self {
        Self {
            bet_id: placed.bet_id,
            tx_hash: placed.tx_hash,
            block_number: placed.block_number,
            amount: placed.amount,
            guess,
            status: BetStatus::Submitted,
        }
    }

    pub fn status(&self) -> BetStatus {
        self.status
    }

    /// Moves the record forward. Backward moves and moves out of a terminal
    /// status are refused.
    pub fn advance(&mut self, next: BetStatus) -> bool {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            tracing::warn!(bet_id = %self.bet_id, from = ?self.status, to = ?next, "refused status change");
            return false;
        }
        self.status = next;
        true
    }
}

#[derive(Debug, Default)]
struct RunFlags {
    running: AtomicBool,
    stop_requested: AtomicBool,
}

/// Cloneable handle for observing and cancelling a run from another task.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flags: Arc<RunFlags>,
}

impl StopHandle {
    /// Asks the running loop to stop before its next iteration. Returns
    /// whether a run was in progress; without one this does nothing.
    pub fn stop(&self) -> bool {
        if !self.flags.running.load(Ordering::SeqCst) {
            return false;
        }
        self.flags.stop_requested.store(true, Ordering::SeqCst);
        true
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.flags.stop_requested.load(Ordering::SeqCst)
    }

    fn begin(&self) -> bool {
        let started = self
            .flags
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if started {
            self.flags.stop_requested.store(false, Ordering::SeqCst);
        }
        started
    }

    fn finish(&self) {
        self.flags.stop_requested.store(false, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestrationState {
    pub running: bool,
    pub stop_requested: bool,
    pub bets_completed: u64,
    pub mode: Option<GuessMode>,
    pub phase: Phase,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requested: u64,
    /// Iterations that began, whether or not a bet was placed.
    pub iterations: u64,
    pub won: u64,
    pub lost: u64,
    pub failed: u64,
    pub unresolved: u64,
    pub stopped: bool,
}

struct Stages {
    game: Address,
    allowance: AllowanceGuard,
    submitter: BetSubmitter,
    waiter: OutcomeWaiter,
    resolver: ResolutionTrigger,
}

pub struct BettingOrchestrator<W, C> {
    connector: ChainConnector,
    stages: Stages,
    chain: C,
    identity: Option<Identity<W>>,
    log: ActivityLog,
    records: Vec<BetRecord>,
    stop: StopHandle,
    rng: StdRng,
    bets_completed: u64,
    mode: Option<GuessMode>,
    phase: Phase,
}

impl<W: WalletProvider, C: ChainRpc> BettingOrchestrator<W, C> {
    pub fn new(config: &BettingConfig, chain: C) -> Self {
        Self {
            connector: ChainConnector::new(config.chain.clone(), config.switch_settle_delay),
            stages: Stages {
                game: config.game,
                allowance: AllowanceGuard::from_config(config),
                submitter: BetSubmitter::from_config(config),
                waiter: OutcomeWaiter::from_config(config),
                resolver: ResolutionTrigger::from_config(config),
            },
            chain,
            identity: None,
            log: ActivityLog::new(),
            records: Vec::new(),
            stop: StopHandle::default(),
            rng: StdRng::from_os_rng(),
            bets_completed: 0,
            mode: None,
            phase: Phase::Idle,
        }
    }

    /// Makes random guesses reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    pub fn records(&self) -> &[BetRecord] {
        &self.records
    }

    pub fn identity(&self) -> Option<&Identity<W>> {
        self.identity.as_ref()
    }

    pub fn state(&self) -> OrchestrationState {
        OrchestrationState {
            running: self.stop.is_running(),
            stop_requested: self.stop.stop_requested(),
            bets_completed: self.bets_completed,
            mode: self.mode,
            phase: self.phase,
        }
    }

    /// Connects `wallet`, replacing any previous identity.
    pub async fn connect_with(&mut self, wallet: W) -> Result<Address> {
        self.phase = Phase::Connecting;
        self.identity = None;
        let result = self.connector.establish(wallet, &mut self.log).await;
        self.phase = Phase::Idle;
        let identity = result?;
        let address = identity.address;
        self.identity = Some(identity);
        Ok(address)
    }

    /// Places `num_bets` bets of `amount` base units one after another.
    ///
    /// Returns early with an error only for invalid input or a lost wallet
    /// identity; stage failures are logged and counted in the summary.
    pub async fn run(&mut self, num_bets: u64, mode: GuessMode, amount: U256) -> Result<RunSummary> {
        if num_bets == 0 {
            return Err(Error::InvalidBetCount);
        }
        if amount.is_zero() {
            return Err(Error::InvalidAmount {
                input: amount.to_string(),
                reason: "amount must be greater than zero".to_string(),
            });
        }
        if self.identity.is_none() {
            self.log.message(Error::NotConnected.to_string());
            return Err(Error::NotConnected);
        }
        if !self.stop.begin() {
            return Err(Error::AlreadyRunning);
        }

        self.mode = Some(mode);
        self.bets_completed = 0;
        tracing::info!(num_bets, %mode, %amount, "betting run started");
        let result = self.run_iterations(num_bets, mode, amount).await;

        self.phase = Phase::Idle;
        self.stop.finish();
        match &result {
            Ok(summary) => tracing::info!(?summary, "betting run finished"),
            Err(err) => {
                tracing::error!(%err, "betting run halted");
                self.identity = None;
            }
        }
        result
    }

    async fn run_iterations(
        &mut self,
        num_bets: u64,
        mode: GuessMode,
        amount: U256,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            requested: num_bets,
            ..RunSummary::default()
        };
        let Self {
            connector,
            stages,
            chain,
            identity,
            log,
            records,
            stop,
            rng,
            bets_completed,
            phase,
            ..
        } = self;
        let Some(identity) = identity.as_ref() else {
            return Err(Error::NotConnected);
        };

        *phase = Phase::Connecting;
        halt_on_lost_identity(&*connector, identity, log).await?;

        for index in 0..num_bets {
            if stop.stop_requested() {
                log.message("Betting stopped.");
                summary.stopped = true;
                break;
            }
            if index > 0 {
                *phase = Phase::Connecting;
                halt_on_lost_identity(&*connector, identity, log).await?;
            }

            let request = BetRequest {
                guess: mode.pick(rng),
                amount,
            };
            log.message(format!("Bet {} of {num_bets}: guessing {}", index + 1, request.guess));
            summary.iterations += 1;

            let mut round = Round {
                stages: &*stages,
                chain: &*chain,
                identity,
                log: &mut *log,
                phase: &mut *phase,
            };
            match round.play(request, records).await {
                Ok(BetStatus::Won) => summary.won += 1,
                Ok(BetStatus::Lost) => summary.lost += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Ok(BetStatus::Failed) | Err(_) => summary.failed += 1,
                Ok(_) => summary.unresolved += 1,
            }
            *bets_completed += 1;
        }
        Ok(summary)
    }
}

impl<C: ChainRpc> BettingOrchestrator<AnyWallet, C> {
    /// Detects the configured wallet and connects it.
    pub async fn connect(&mut self, kind: &ProviderKind, default_rpc_url: &str) -> Result<Address> {
        self.phase = Phase::Connecting;
        self.identity = None;
        let result = self
            .connector
            .connect(kind, default_rpc_url, &mut self.log)
            .await;
        self.phase = Phase::Idle;
        let identity = result?;
        let address = identity.address;
        self.identity = Some(identity);
        Ok(address)
    }
}

async fn halt_on_lost_identity<W: WalletProvider>(
    connector: &ChainConnector,
    identity: &Identity<W>,
    log: &mut ActivityLog,
) -> Result<()> {
    connector.verify(identity).await.inspect_err(|err| {
        log.message(format!("{err}. Reconnect to continue."));
    })
}

/// Borrowed view of the orchestrator for a single iteration.
struct Round<'a, W, C> {
    stages: &'a Stages,
    chain: &'a C,
    identity: &'a Identity<W>,
    log: &'a mut ActivityLog,
    phase: &'a mut Phase,
}

impl<W: WalletProvider, C: ChainRpc> Round<'_, W, C> {
    /// Runs one bet. `Err` means no bet was placed; otherwise the status the
    /// new record ended in.
    async fn play(&mut self, request: BetRequest, records: &mut Vec<BetRecord>) -> Result<BetStatus> {
        let stages = self.stages;

        *self.phase = Phase::Approving;
        stages
            .allowance
            .ensure_allowance(self.identity, self.chain, stages.game, request.amount, self.log)
            .await?;

        *self.phase = Phase::Submitting;
        let placed = stages
            .submitter
            .submit(self.identity, self.chain, &request, self.log)
            .await?;
        records.push(BetRecord::submitted(&placed, request.guess));
        let index = records.len() - 1;

        *self.phase = Phase::Waiting;
        records[index].advance(BetStatus::AwaitingBlocks);
        if let Err(err) = stages
            .waiter
            .await_outcome(self.chain, placed.block_number, self.log)
            .await
        {
            tracing::warn!(bet_id = %placed.bet_id, %err, "bet left awaiting blocks");
            self.log.message(format!(
                "Bet {} left unresolved; resolve it once block {} is available.",
                placed.bet_id,
                stages.waiter.resolving_block(placed.block_number)
            ));
            return Ok(BetStatus::AwaitingBlocks);
        }

        *self.phase = Phase::Resolving;
        records[index].advance(BetStatus::Resolving);
        let status = match stages
            .resolver
            .resolve(self.identity, self.chain, placed.bet_id, self.log)
            .await
        {
            Ok(resolution) if resolution.won => BetStatus::Won,
            Ok(_) => BetStatus::Lost,
            Err(_) => BetStatus::Failed,
        };
        records[index].advance(status);
        Ok(status)
    }
}
