use crate::ui::{
    self,
    LogRenderer,
};
use alloy::primitives::{
    Address,
    U256,
};
use base_bettor::{
    activity_log::{
        ActivityLog,
        LogEntry,
    },
    amount::parse_token_amount,
    balances::fetch_status,
    claim::TokenClaimer,
    config::BettingConfig,
    connector::ChainConnector,
    guess::GuessMode,
    orchestrator::{
        BettingOrchestrator,
        StopHandle,
    },
    rpc::AlloyChain,
    wallet::{
        AnyWallet,
        ProviderKind,
    },
    wallets,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentStore,
    NetworkDeployment,
};
use std::{
    path::PathBuf,
    sync::OnceLock,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Sends tracing output to a daily file under `logs/`, keeping stdout for
/// the activity log.
pub fn init_tracing() {
    let appender = rolling::daily("logs", "base-bettor.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let initialized = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .is_ok();
    if initialized {
        let _ = LOG_GUARD.set(guard);
    }
}

#[derive(Clone, Debug)]
pub enum AppCommand {
    Bet {
        num_bets: u64,
        mode: GuessMode,
        amount: String,
    },
    Claim,
    Status {
        address: Option<Address>,
    },
    Rules,
    Wallets,
    Config {
        save: bool,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,
    pub rpc_url: Option<String>,
    pub wallet: ProviderKind,
    pub command: AppCommand,
}

impl AppConfig {
    fn store(&self) -> DeploymentStore {
        match &self.config_path {
            Some(path) => DeploymentStore::at(path),
            None => DeploymentStore::new(),
        }
    }

    fn deployment(&self) -> Result<NetworkDeployment> {
        let store = self.store();
        let mut deployment = store
            .load_or_default()
            .map_err(|e| eyre!("{e:#}"))
            .wrap_err_with(|| format!("loading {}", store.path().display()))?;
        if let Some(url) = &self.rpc_url {
            deployment.rpc_url = url.clone();
        }
        Ok(deployment)
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let deployment = config.deployment()?;
    tracing::info!(%deployment, command = ?config.command, "starting base-bettor");
    match &config.command {
        AppCommand::Rules => {
            println!("{}", ui::RULES);
            Ok(())
        }
        AppCommand::Wallets => list_keystores(&config.wallet),
        AppCommand::Config { save } => show_config(&config, &deployment, *save),
        AppCommand::Status { address } => show_status(&deployment, *address).await,
        AppCommand::Claim => claim(&config.wallet, &deployment).await,
        AppCommand::Bet {
            num_bets,
            mode,
            amount,
        } => bet(&config.wallet, &deployment, *num_bets, *mode, amount).await,
    }
}

fn connect_chain(deployment: &NetworkDeployment) -> Result<AlloyChain> {
    AlloyChain::connect(&deployment.rpc_url)
        .map_err(|e| eyre!("{e}"))
        .wrap_err("connecting to the RPC endpoint")
}

/// Prints every entry appended to the log until the log is dropped.
fn spawn_printer(
    mut entries: mpsc::UnboundedReceiver<LogEntry>,
    deployment: NetworkDeployment,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let renderer = LogRenderer::new(&deployment);
        while let Some(entry) = entries.recv().await {
            println!("{}", renderer.render(&entry));
        }
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Interrupt {
    StopAfterBet,
    Quit,
}

/// The first Ctrl-C during a run stops after the bet in flight. Any other
/// Ctrl-C, including one while the wallet is still connecting, quits.
fn classify_interrupt(presses: u32, stop: &StopHandle) -> Interrupt {
    if presses == 1 && stop.stop() {
        Interrupt::StopAfterBet
    } else {
        Interrupt::Quit
    }
}

async fn bet(
    wallet: &ProviderKind,
    deployment: &NetworkDeployment,
    num_bets: u64,
    mode: GuessMode,
    amount: &str,
) -> Result<()> {
    let amount: U256 = parse_token_amount(amount, deployment.token_decimals)?;
    let config = BettingConfig::from_deployment(deployment)?;
    let chain = connect_chain(deployment)?;

    let mut orchestrator: BettingOrchestrator<AnyWallet, AlloyChain> =
        BettingOrchestrator::new(&config, chain);
    let printer = spawn_printer(orchestrator.log_mut().subscribe(), deployment.clone());

    let stop = orchestrator.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        let mut presses = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            match classify_interrupt(presses, &stop) {
                Interrupt::StopAfterBet => {
                    tracing::info!("stop requested from terminal");
                    eprintln!("Stopping after the current bet... press Ctrl-C again to quit now.");
                }
                Interrupt::Quit => {
                    tracing::warn!(presses, "interrupted from terminal");
                    eprintln!("Interrupted.");
                    std::process::exit(130);
                }
            }
        }
    });

    let result = match orchestrator.connect(wallet, &deployment.rpc_url).await {
        Ok(_) => orchestrator.run(num_bets, mode, amount).await,
        Err(err) => Err(err),
    };
    ctrl_c.abort();
    drop(orchestrator);
    let _ = printer.await;

    let summary = result?;
    println!("{}", ui::render_summary(&summary));
    Ok(())
}

async fn claim(wallet: &ProviderKind, deployment: &NetworkDeployment) -> Result<()> {
    let config = BettingConfig::from_deployment(deployment)?;
    let chain = connect_chain(deployment)?;
    let mut log = ActivityLog::new();
    let printer = spawn_printer(log.subscribe(), deployment.clone());

    let connector = ChainConnector::new(config.chain.clone(), config.switch_settle_delay);
    let identity = connector.connect(wallet, &deployment.rpc_url, &mut log).await.ok();
    let result = TokenClaimer::from_config(&config)
        .claim(identity.as_ref(), &chain, &mut log)
        .await;
    drop(log);
    let _ = printer.await;

    let tx_hash = result?;
    println!(
        "Tokens claimed: {}",
        deployment.explorer_tx_url(&tx_hash.to_string())
    );
    Ok(())
}

async fn show_status(deployment: &NetworkDeployment, address: Option<Address>) -> Result<()> {
    let config = BettingConfig::from_deployment(deployment)?;
    let chain = connect_chain(deployment)?;
    let status = fetch_status(&config, &chain, address, &deployment.token_ticker).await?;
    println!("Network: {deployment}");
    println!("{status}");
    Ok(())
}

fn list_keystores(wallet: &ProviderKind) -> Result<()> {
    let dir = match wallet {
        ProviderKind::Keystore { dir, .. } => dir.clone(),
        ProviderKind::Bridge { .. } => wallets::default_wallet_dir()?,
    };
    let found = wallets::list_wallets(&dir)?;
    if found.is_empty() {
        println!("No keystores found in {}", dir.display());
    }
    for descriptor in found {
        println!("{}\t{}", descriptor.name, descriptor.path.display());
    }
    Ok(())
}

fn show_config(config: &AppConfig, deployment: &NetworkDeployment, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(deployment)?);
    println!("{}", deployment.manual_switch_details());
    if save {
        let store = config.store();
        store.save(deployment).map_err(|e| eyre!("{e:#}"))?;
        println!("Saved to {}", store.path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn classify_interrupt__while_connecting__quits() {
        // given
        let stop = StopHandle::default();

        // when
        let action = classify_interrupt(1, &stop);

        // then
        assert_eq!(action, Interrupt::Quit);
        assert!(!stop.stop_requested());
    }

    #[test]
    fn classify_interrupt__second_press__quits() {
        let stop = StopHandle::default();
        assert_eq!(classify_interrupt(2, &stop), Interrupt::Quit);
    }
}
