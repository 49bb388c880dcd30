use crate::{
    amount::format_token_amount,
    config::BettingConfig,
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
    token_types::Erc20,
};
use alloy::primitives::{
    Address,
    U256,
};
use std::fmt;

/// Token balances and the game's bet counter at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameStatus {
    pub user: Option<Address>,
    pub user_balance: Option<U256>,
    pub vault_balance: U256,
    pub bet_counter: U256,
    pub decimals: u8,
    pub ticker: String,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(user), Some(balance)) = (self.user, self.user_balance) {
            writeln!(
                f,
                "Your balance ({user}): {} {}",
                format_token_amount(balance, self.decimals),
                self.ticker
            )?;
        }
        writeln!(
            f,
            "Vault balance: {} {}",
            format_token_amount(self.vault_balance, self.decimals),
            self.ticker
        )?;
        write!(f, "Total bets: {}", self.bet_counter)
    }
}

pub async fn fetch_status<C: ChainRpc>(
    config: &BettingConfig,
    chain: &C,
    user: Option<Address>,
    ticker: &str,
) -> Result<GameStatus> {
    let rpc_error = |e: ProviderError| Error::Rpc {
        reason: e.to_string(),
    };
    let user_balance = match user {
        Some(owner) => Some(
            token_balance(config, chain, owner)
                .await
                .map_err(rpc_error)?,
        ),
        None => None,
    };
    let vault_balance = token_balance(config, chain, config.game)
        .await
        .map_err(rpc_error)?;
    let counter = GuessCounterGame::betCounterCall {};
    let bet_counter = with_retry(&config.retry, "betCounter", || {
        call_view(chain, config.game, &counter)
    })
    .await
    .map_err(rpc_error)?
    ._0;
    Ok(GameStatus {
        user,
        user_balance,
        vault_balance,
        bet_counter,
        decimals: config.token_decimals,
        ticker: ticker.to_string(),
    })
}

async fn token_balance<C: ChainRpc>(
    config: &BettingConfig,
    chain: &C,
    owner: Address,
) -> std::result::Result<U256, ProviderError> {
    let call = Erc20::balanceOfCall { owner };
    let balance = with_retry(&config.retry, "balanceOf", || {
        call_view(chain, config.token, &call)
    })
    .await?;
    Ok(balance._0)
}
