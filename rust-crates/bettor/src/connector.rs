use crate::{
    activity_log::ActivityLog,
    error::{
        Error,
        ProviderError,
        Result,
    },
    wallet::{
        self,
        AnyWallet,
        ChainDescriptor,
        ProviderKind,
        WalletProvider,
    },
};
use alloy::primitives::Address;
use std::time::Duration;

/// A connected signing identity.
///
/// `signer` is the wallet that produced the identity; it is replaced together
/// with the address and chain id whenever the connection is re-established.
pub struct Identity<W> {
    pub address: Address,
    pub chain_id: u64,
    pub signer: W,
}

pub struct ChainConnector {
    chain: ChainDescriptor,
    settle_delay: Duration,
}

impl ChainConnector {
    pub fn new(chain: ChainDescriptor, settle_delay: Duration) -> Self {
        Self {
            chain,
            settle_delay,
        }
    }

    /// Detects the wallet named by `kind` and connects it.
    pub async fn connect(
        &self,
        kind: &ProviderKind,
        default_rpc_url: &str,
        log: &mut ActivityLog,
    ) -> Result<Identity<AnyWallet>> {
        let wallet = match wallet::detect(kind, default_rpc_url).await {
            Ok(wallet) => wallet,
            Err(err) => {
                tracing::warn!(%err, "wallet not detected");
                log.message(err.to_string());
                return Err(err);
            }
        };
        self.establish(wallet, log).await
    }

    /// Authorizes an account on `wallet` and moves it to the required network
    /// where possible. A wallet left on the wrong network still connects; the
    /// user is told how to switch manually.
    pub async fn establish<W: WalletProvider>(
        &self,
        mut wallet: W,
        log: &mut ActivityLog,
    ) -> Result<Identity<W>> {
        let name = wallet.name().to_string();
        let accounts = wallet
            .request_accounts()
            .await
            .map_err(|e| connection_failed(log, e.to_string()))?;
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| connection_failed(log, "wallet returned no accounts".to_string()))?;
        let mut chain_id = wallet
            .chain_id()
            .await
            .map_err(|e| connection_failed(log, e.to_string()))?;

        if chain_id != self.chain.chain_id_number {
            chain_id = self.negotiate_switch(&mut wallet, &name, log).await?;
        }

        log.message(format!("Connected with {name}: {address}"));
        tracing::info!(%address, chain_id, wallet = %name, "wallet connected");
        Ok(Identity {
            address,
            chain_id,
            signer: wallet,
        })
    }

    async fn negotiate_switch<W: WalletProvider>(
        &self,
        wallet: &mut W,
        name: &str,
        log: &mut ActivityLog,
    ) -> Result<u64> {
        let network = &self.chain.chain_name;
        log.message(format!("Detected wallet: {name}. Switching to {network}..."));

        let switched = match wallet.switch_chain(&self.chain.chain_id).await {
            Ok(()) => true,
            Err(err) if err.is_unrecognized_chain() => {
                match self.add_then_switch(wallet, name, log).await {
                    Ok(()) => true,
                    Err(err) => {
                        log.message(format!("Failed to add chain to {name}: {err}"));
                        false
                    }
                }
            }
            Err(err) => {
                log.message(format!("Switch failed for {name}: {err}"));
                false
            }
        };

        if switched {
            tokio::time::sleep(self.settle_delay).await;
        }

        let chain_id = wallet
            .chain_id()
            .await
            .map_err(|e| connection_failed(log, e.to_string()))?;
        if chain_id == self.chain.chain_id_number {
            log.message(format!("Successfully switched to {network}!"));
        } else {
            tracing::warn!(chain_id, required = self.chain.chain_id_number, "wallet left on wrong network");
            log.message(format!(
                "Failed to switch to {network} in {name}. Please switch manually."
            ));
            log.message(self.manual_switch_details());
            log.message(
                "Connected anyway. Please switch network manually in wallet to use the app fully.",
            );
        }
        Ok(chain_id)
    }

    async fn add_then_switch<W: WalletProvider>(
        &self,
        wallet: &mut W,
        name: &str,
        log: &mut ActivityLog,
    ) -> std::result::Result<(), ProviderError> {
        wallet.add_chain(&self.chain).await?;
        log.message(format!("Chain added to {name}. Now switching..."));
        wallet.switch_chain(&self.chain.chain_id).await
    }

    fn manual_switch_details(&self) -> String {
        format!(
            "Network details: Chain ID: {}, RPC: {}, Symbol: {}, Explorer: {}",
            self.chain.chain_id_number,
            self.chain.rpc_urls.first().map(String::as_str).unwrap_or_default(),
            self.chain.native_currency.symbol,
            self.chain
                .block_explorer_urls
                .first()
                .map(|url| url.trim_end_matches('/'))
                .unwrap_or_default(),
        )
    }

    /// Confirms the wallet still reports the account and network the
    /// identity was created with.
    pub async fn verify<W: WalletProvider>(&self, identity: &Identity<W>) -> Result<()> {
        let lost = |reason: String| Error::IdentityLost { reason };
        let accounts = identity
            .signer
            .accounts()
            .await
            .map_err(|e| lost(format!("wallet unavailable: {e}")))?;
        if accounts.first() != Some(&identity.address) {
            return Err(lost(format!(
                "wallet account changed from {}",
                identity.address
            )));
        }
        let chain_id = identity
            .signer
            .chain_id()
            .await
            .map_err(|e| lost(format!("wallet unavailable: {e}")))?;
        if chain_id != identity.chain_id {
            return Err(lost(format!(
                "wallet network changed from {} to {chain_id}",
                identity.chain_id
            )));
        }
        Ok(())
    }
}

fn connection_failed(log: &mut ActivityLog, reason: String) -> Error {
    let err = Error::Connection { reason };
    tracing::warn!(%err, "connection failed");
    log.message(err.to_string());
    err
}
