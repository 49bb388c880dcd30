use alloy::primitives::Address;
use base_bettor::{
    guess::{
        Guess,
        GuessMode,
    },
    wallet::{
        ProviderKind,
        bridge::DEFAULT_BRIDGE_URL,
    },
    wallets,
};
use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::path::PathBuf;

mod client;
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "base-bettor",
    about = "Bet on the last hex character of Base block hashes",
    version
)]
struct Cli {
    /// Deployment record overriding the Base defaults
    /// (defaults to .deployments/base/deployments.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the RPC URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Wallet to sign with
    #[arg(long, global = true, value_enum, default_value = "keystore")]
    wallet: WalletKind,

    /// Keystore name (required with --wallet keystore)
    #[arg(long, global = true)]
    keystore: Option<String>,

    /// Keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long, global = true)]
    keystore_dir: Option<String>,

    /// JSON-RPC endpoint of the wallet bridge
    #[arg(long, global = true, default_value = DEFAULT_BRIDGE_URL)]
    bridge_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WalletKind {
    Keystore,
    Bridge,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place one or more bets
    Bet {
        /// Number of bets to place in a row
        #[arg(short = 'n', long, default_value_t = 1)]
        bets: u64,

        /// Tokens per bet, e.g. 100 or 0.5
        #[arg(short, long)]
        amount: String,

        /// Fixed guess (0-9, a-f); omit to guess at random each time
        #[arg(short, long)]
        guess: Option<String>,
    },
    /// Claim free tokens from the faucet
    Claim,
    /// Show balances and the number of bets played
    Status {
        /// Address whose token balance to show
        #[arg(long)]
        address: Option<String>,
    },
    /// Print the game rules
    Rules,
    /// List keystores available to --wallet keystore
    Wallets,
    /// Print the effective network configuration
    Config {
        /// Write it to the deployment record
        #[arg(long)]
        save: bool,
    },
}

fn parse_cli_args() -> Result<client::AppConfig> {
    let cli = Cli::parse();

    let wallet = match cli.wallet {
        WalletKind::Keystore => ProviderKind::Keystore {
            name: cli.keystore.clone().unwrap_or_default(),
            dir: wallets::resolve_wallet_dir(cli.keystore_dir.as_deref())?,
        },
        WalletKind::Bridge => ProviderKind::Bridge {
            url: cli.bridge_url.clone(),
        },
    };
    let needs_signer = matches!(cli.command, Command::Bet { .. } | Command::Claim);
    if needs_signer && matches!(cli.wallet, WalletKind::Keystore) && cli.keystore.is_none() {
        return Err(eyre!(
            "Specify --keystore <name> to select a keystore, or use --wallet bridge"
        ));
    }

    let command = match cli.command {
        Command::Bet {
            bets,
            amount,
            guess,
        } => {
            if bets == 0 {
                return Err(eyre!("--bets must be a positive integer"));
            }
            let mode = match guess {
                Some(raw) => GuessMode::Manual(raw.parse::<Guess>()?),
                None => GuessMode::Random,
            };
            client::AppCommand::Bet {
                num_bets: bets,
                mode,
                amount,
            }
        }
        Command::Claim => client::AppCommand::Claim,
        Command::Status { address } => client::AppCommand::Status {
            address: address
                .map(|raw| {
                    raw.parse::<Address>()
                        .map_err(|e| eyre!("invalid address {raw}: {e}"))
                })
                .transpose()?,
        },
        Command::Rules => client::AppCommand::Rules,
        Command::Wallets => client::AppCommand::Wallets,
        Command::Config { save } => client::AppCommand::Config { save },
    };

    Ok(client::AppConfig {
        config_path: cli.config,
        rpc_url: cli.rpc_url,
        wallet,
        command,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    client::init_tracing();
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
