//! Wallet providers the client can sign with.
//!
//! Each supported wallet is one variant of [`AnyWallet`], chosen by
//! [`ProviderKind`] from configuration. All of them speak the same
//! EIP-1193 shaped [`WalletProvider`] interface.

use crate::error::{
    Error,
    ProviderError,
};
use alloy::{
    primitives::{
        Address,
        TxHash,
    },
    rpc::types::TransactionRequest,
};
use deployments::{
    NativeCurrency,
    NetworkDeployment,
};
use serde::Serialize;
use std::{
    future::Future,
    path::PathBuf,
};

pub mod bridge;
pub mod keystore;

pub use bridge::BridgeWallet;
pub use keystore::KeystoreWallet;

/// Parameters for `wallet_addEthereumChain`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    #[serde(skip)]
    pub chain_id_number: u64,
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    pub fn from_deployment(deployment: &NetworkDeployment) -> Self {
        Self {
            chain_id_number: deployment.chain_id,
            chain_id: deployment.chain_id_hex(),
            chain_name: deployment.network_name.clone(),
            rpc_urls: vec![deployment.rpc_url.clone()],
            native_currency: deployment.native_currency.clone(),
            block_explorer_urls: vec![format!(
                "{}/",
                deployment.explorer_url.trim_end_matches('/')
            )],
        }
    }
}

/// Parses a `0x`-prefixed chain id as used by `wallet_switchEthereumChain`.
pub fn parse_chain_id_hex(hex: &str) -> Result<u64, ProviderError> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .ok_or_else(|| ProviderError::new(format!("chain id {hex} is not 0x-prefixed")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::new(format!("invalid chain id {hex}: {e}")))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Encrypted Web3 secret-storage keystore on disk.
    Keystore { name: String, dir: PathBuf },
    /// External wallet exposing EIP-1193 methods over JSON-RPC (e.g. Frame).
    Bridge { url: String },
}

pub trait WalletProvider {
    fn name(&self) -> &str;

    /// Asks the user to authorize the client; returns the authorized accounts.
    fn request_accounts(
        &mut self,
    ) -> impl Future<Output = Result<Vec<Address>, ProviderError>>;

    /// Currently authorized accounts, without prompting.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>, ProviderError>>;

    fn chain_id(&self) -> impl Future<Output = Result<u64, ProviderError>>;

    /// Fails with code 4902 when the wallet does not know the chain.
    fn switch_chain(
        &mut self,
        chain_id_hex: &str,
    ) -> impl Future<Output = Result<(), ProviderError>>;

    fn add_chain(
        &mut self,
        chain: &ChainDescriptor,
    ) -> impl Future<Output = Result<(), ProviderError>>;

    /// Signs and broadcasts `tx`; resolves once the network accepted it.
    fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<TxHash, ProviderError>>;
}

pub enum AnyWallet {
    Keystore(KeystoreWallet),
    Bridge(BridgeWallet),
}

/// Finds the wallet named by `kind`, failing with `ProviderNotDetected` when
/// it is not available in this environment.
pub async fn detect(kind: &ProviderKind, default_rpc_url: &str) -> Result<AnyWallet, Error> {
    match kind {
        ProviderKind::Keystore { name, dir } => {
            KeystoreWallet::detect(name, dir, default_rpc_url).map(AnyWallet::Keystore)
        }
        ProviderKind::Bridge { url } => {
            BridgeWallet::detect(url).await.map(AnyWallet::Bridge)
        }
    }
}

impl WalletProvider for AnyWallet {
    fn name(&self) -> &str {
        match self {
            AnyWallet::Keystore(wallet) => wallet.name(),
            AnyWallet::Bridge(wallet) => wallet.name(),
        }
    }

    async fn request_accounts(&mut self) -> Result<Vec<Address>, ProviderError> {
        match self {
            AnyWallet::Keystore(wallet) => wallet.request_accounts().await,
            AnyWallet::Bridge(wallet) => wallet.request_accounts().await,
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match self {
            AnyWallet::Keystore(wallet) => wallet.accounts().await,
            AnyWallet::Bridge(wallet) => wallet.accounts().await,
        }
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        match self {
            AnyWallet::Keystore(wallet) => wallet.chain_id().await,
            AnyWallet::Bridge(wallet) => wallet.chain_id().await,
        }
    }

    async fn switch_chain(&mut self, chain_id_hex: &str) -> Result<(), ProviderError> {
        match self {
            AnyWallet::Keystore(wallet) => wallet.switch_chain(chain_id_hex).await,
            AnyWallet::Bridge(wallet) => wallet.switch_chain(chain_id_hex).await,
        }
    }

    async fn add_chain(&mut self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        match self {
            AnyWallet::Keystore(wallet) => wallet.add_chain(chain).await,
            AnyWallet::Bridge(wallet) => wallet.add_chain(chain).await,
        }
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError> {
        match self {
            AnyWallet::Keystore(wallet) => wallet.send_transaction(tx).await,
            AnyWallet::Bridge(wallet) => wallet.send_transaction(tx).await,
        }
    }
}
