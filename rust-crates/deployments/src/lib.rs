use anyhow::{
    Context,
    Result,
    anyhow,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const NETWORK_DIR: &str = "base";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub const BASE_RPC_URL: &str = "https://mainnet.base.org";
pub const BASE_CHAIN_ID: u64 = 8453;
pub const BASE_EXPLORER_URL: &str = "https://basescan.org";
pub const GAME_CONTRACT: &str = "0x64f82C34e8F0f023952977E3B74fc5370C425c34";
pub const TOKEN_CONTRACT: &str = "0xaF0a8E5465D04Ec8e2F67028dD7BC04903F1E36a";
pub const CLAIM_CONTRACT: &str = "0xc3C033bb090a341330d5b30DAA80B9Deb1F6d120";
pub const DEFAULT_WAIT_BLOCKS: u64 = 4;
pub const DEFAULT_APPROVAL_COOLDOWN_MS: u64 = 1_000;
pub const DEFAULT_SWITCH_SETTLE_MS: u64 = 2_500;
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self {
            name: "ETH".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

/// Everything the client needs to know about the one network it plays on.
///
/// The values are fixed configuration, never discovered at runtime. A record
/// on disk only overrides the fields it names; the rest fall back to Base
/// mainnet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDeployment {
    pub network_name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: String,
    pub native_currency: NativeCurrency,
    pub game_contract: String,
    pub token_contract: String,
    pub claim_contract: String,
    pub token_ticker: String,
    pub token_decimals: u8,
    pub wait_blocks: u64,
    pub approval_cooldown_ms: u64,
    pub switch_settle_ms: u64,
}

impl Default for NetworkDeployment {
    fn default() -> Self {
        Self {
            network_name: "Base".to_string(),
            rpc_url: BASE_RPC_URL.to_string(),
            chain_id: BASE_CHAIN_ID,
            explorer_url: BASE_EXPLORER_URL.to_string(),
            native_currency: NativeCurrency::default(),
            game_contract: GAME_CONTRACT.to_string(),
            token_contract: TOKEN_CONTRACT.to_string(),
            claim_contract: CLAIM_CONTRACT.to_string(),
            token_ticker: "GTK".to_string(),
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            wait_blocks: DEFAULT_WAIT_BLOCKS,
            approval_cooldown_ms: DEFAULT_APPROVAL_COOLDOWN_MS,
            switch_settle_ms: DEFAULT_SWITCH_SETTLE_MS,
        }
    }
}

impl NetworkDeployment {
    /// Chain id in the `0x`-prefixed form wallets expect, e.g. `0x2105`.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }

    pub fn explorer_block_url(&self, block: impl fmt::Display) -> String {
        format!("{}/block/{block}", self.explorer_url.trim_end_matches('/'))
    }

    /// One-line summary users can copy into a wallet when automatic switching fails.
    pub fn manual_switch_details(&self) -> String {
        format!(
            "Network details: Chain ID: {}, RPC: {}, Symbol: {}, Explorer: {}",
            self.chain_id, self.rpc_url, self.native_currency.symbol, self.explorer_url
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(anyhow!("chain_id must be non-zero"));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(anyhow!("rpc_url must not be empty"));
        }
        if self.wait_blocks == 0 {
            return Err(anyhow!("wait_blocks must be at least 1"));
        }
        Ok(())
    }
}

impl fmt::Display for NetworkDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (chain {}) via {}",
            self.network_name, self.chain_id, self.rpc_url
        )
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    /// Store rooted at the default `.deployments/base/deployments.json`.
    pub fn new() -> Self {
        Self::at(Path::new(DEPLOYMENTS_ROOT).join(NETWORK_DIR).join(DEPLOYMENTS_FILE))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored record, or the Base defaults when nothing is stored.
    pub fn load_or_default(&self) -> Result<NetworkDeployment> {
        let record = match read_record(&self.path)? {
            Some(record) => record,
            None => NetworkDeployment::default(),
        };
        record.validate().with_context(|| {
            format!("Invalid deployment record at {}", self.path.display())
        })?;
        Ok(record)
    }

    pub fn save(&self, record: &NetworkDeployment) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create deployment directory {}", parent.display())
            })?;
        }
        write_record(&self.path, record)
    }
}

impl Default for DeploymentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<NetworkDeployment>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path).context("Failed to read deployment records")?;
    if data.is_empty() || data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<NetworkDeployment>(&data)
        .map(Some)
        .map_err(|e| anyhow!("Failed to parse deployment record JSON: {e}"))
}

fn write_record(path: impl AsRef<Path>, record: &NetworkDeployment) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}
