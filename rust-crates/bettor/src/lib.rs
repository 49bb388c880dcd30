pub use contract_abi::{
    claim_types,
    find_bet_placed,
    game_types,
    token_types,
};

pub mod activity_log;
pub mod allowance;
pub mod amount;
pub mod balances;
pub mod claim;
pub mod config;
pub mod connector;
pub mod error;
pub mod guess;
pub mod orchestrator;
pub mod outcome;
pub mod resolution;
pub mod rpc;
pub mod submitter;
pub mod transactions;
pub mod wallet;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{
    Error,
    ProviderError,
    Result,
};
