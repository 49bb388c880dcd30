use super::{
    ChainDescriptor,
    WalletProvider,
    parse_chain_id_hex,
};
use crate::{
    error::{
        Error,
        ProviderError,
    },
    wallets::{
        self,
        WalletDescriptor,
    },
};
use alloy::{
    network::{
        EthereumWallet,
        TransactionBuilder,
    },
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
    signers::local::PrivateKeySigner,
};
use rpassword::prompt_password;
use std::{
    collections::HashMap,
    path::Path,
};
use url::Url;

/// Local keystore wallet.
///
/// It behaves like a browser wallet with a list of known networks: it starts
/// on the RPC it was opened with, can only switch to networks it has been
/// told about, and learns new ones through `add_chain`.
pub struct KeystoreWallet {
    label: String,
    descriptor: WalletDescriptor,
    signer: Option<PrivateKeySigner>,
    known_chains: HashMap<u64, Url>,
    active_url: Url,
    provider: DynProvider,
}

impl KeystoreWallet {
    pub fn detect(name: &str, dir: &Path, rpc_url: &str) -> Result<Self, Error> {
        let label = format!("Keystore ({name})");
        let not_detected = |reason: String| Error::ProviderNotDetected {
            provider: label.clone(),
            reason,
        };
        let descriptor = wallets::find_wallet(dir, name).map_err(|e| {
            not_detected(format!(
                "{e}. Create one with `cast wallet import {name} --interactive`."
            ))
        })?;
        let url: Url = rpc_url
            .parse()
            .map_err(|e| not_detected(format!("invalid RPC URL {rpc_url}: {e}")))?;
        Ok(Self {
            provider: read_only(url.clone()),
            label,
            descriptor,
            signer: None,
            known_chains: HashMap::new(),
            active_url: url,
        })
    }

    fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(PrivateKeySigner::address)
    }

    fn connect_active(&mut self) {
        self.provider = match &self.signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer.clone()))
                .on_http(self.active_url.clone())
                .erased(),
            None => read_only(self.active_url.clone()),
        };
    }
}

fn read_only(url: Url) -> DynProvider {
    ProviderBuilder::new().on_http(url).erased()
}

impl WalletProvider for KeystoreWallet {
    fn name(&self) -> &str {
        &self.label
    }

    async fn request_accounts(&mut self) -> Result<Vec<Address>, ProviderError> {
        if let Some(address) = self.address() {
            return Ok(vec![address]);
        }
        let prompt = format!("Enter password for keystore '{}': ", self.descriptor.name);
        let password = prompt_password(prompt)
            .map_err(|e| ProviderError::user_rejected(format!("password prompt failed: {e}")))?;
        let signer = wallets::unlock_wallet(&self.descriptor, &password)
            .map_err(|e| ProviderError::user_rejected(e.to_string()))?;
        let address = signer.address();
        self.signer = Some(signer);

        let chain_id = self.provider.get_chain_id().await?;
        self.known_chains.insert(chain_id, self.active_url.clone());
        self.connect_active();
        tracing::info!(%address, chain_id, "keystore unlocked");
        Ok(vec![address])
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(self.address().into_iter().collect())
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn switch_chain(&mut self, chain_id_hex: &str) -> Result<(), ProviderError> {
        let chain_id = parse_chain_id_hex(chain_id_hex)?;
        let url = self
            .known_chains
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| ProviderError::unrecognized_chain(chain_id_hex))?;
        self.active_url = url;
        self.connect_active();
        tracing::info!(chain_id, url = %self.active_url, "keystore wallet switched network");
        Ok(())
    }

    async fn add_chain(&mut self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        let expected = parse_chain_id_hex(&chain.chain_id)?;
        let raw_url = chain
            .rpc_urls
            .first()
            .ok_or_else(|| ProviderError::new("chain descriptor has no RPC URL"))?;
        let url: Url = raw_url
            .parse()
            .map_err(|e| ProviderError::new(format!("invalid RPC URL {raw_url}: {e}")))?;
        let reported = read_only(url.clone()).get_chain_id().await?;
        if reported != expected {
            return Err(ProviderError::new(format!(
                "RPC {raw_url} reports chain {reported}, expected {expected}"
            )));
        }
        self.known_chains.insert(expected, url);
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ProviderError> {
        let from = self
            .address()
            .ok_or_else(|| ProviderError::new("keystore is locked; connect first"))?;
        let pending = self.provider.send_transaction(tx.with_from(from)).await?;
        Ok(*pending.tx_hash())
    }
}
