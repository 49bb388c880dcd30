use super::{
    ChainDescriptor,
    WalletProvider,
};
use crate::error::{
    Error,
    ProviderError,
};
use alloy::{
    network::TransactionBuilder,
    primitives::{
        Address,
        TxHash,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
};
use serde_json::{
    Value,
    json,
};
use url::Url;

/// Default endpoint of Frame, a desktop wallet that serves EIP-1193 over HTTP.
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:1248";

/// Wallet reached through a local JSON-RPC endpoint that forwards
/// `eth_requestAccounts`, `wallet_switchEthereumChain` and friends to the
/// user for approval.
pub struct BridgeWallet {
    label: String,
    provider: DynProvider,
    selected: Option<Address>,
}

impl BridgeWallet {
    pub async fn detect(url: &str) -> Result<Self, Error> {
        let label = "Wallet bridge".to_string();
        let not_detected = |reason: String| Error::ProviderNotDetected {
            provider: label.clone(),
            reason,
        };
        let parsed: Url = url
            .parse()
            .map_err(|e| not_detected(format!("invalid bridge URL {url}: {e}")))?;
        let provider = ProviderBuilder::new().on_http(parsed).erased();
        let version: String = provider
            .raw_request("web3_clientVersion".into(), ())
            .await
            .map_err(|e| {
                not_detected(format!(
                    "No wallet answered at {url} ({e}). Please install or start it."
                ))
            })?;
        tracing::info!(%url, %version, "wallet bridge detected");
        Ok(Self {
            label: format!("{label} ({version})"),
            provider,
            selected: None,
        })
    }
}

impl WalletProvider for BridgeWallet {
    fn name(&self) -> &str {
        &self.label
    }

    async fn request_accounts(&mut self) -> Result<Vec<Address>, ProviderError> {
        let accounts: Vec<Address> = self
            .provider
            .raw_request("eth_requestAccounts".into(), ())
            .await?;
        self.selected = accounts.first().copied();
        Ok(accounts)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn switch_chain(&mut self, chain_id_hex: &str) -> Result<(), ProviderError> {
        let _: Value = self
            .provider
            .raw_request(
                "wallet_switchEthereumChain".into(),
                [json!({ "chainId": chain_id_hex })],
            )
            .await?;
        Ok(())
    }

    async fn add_chain(&mut self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        let _: Value = self
            .provider
            .raw_request("wallet_addEthereumChain".into(), [chain.clone()])
            .await?;
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError> {
        let from = self
            .selected
            .ok_or_else(|| ProviderError::new("no account authorized; connect first"))?;
        let hash: TxHash = self
            .provider
            .raw_request("eth_sendTransaction".into(), [tx.with_from(from)])
            .await?;
        Ok(hash)
    }
}
