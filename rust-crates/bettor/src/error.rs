use alloy::transports::TransportError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the betting engine.
///
/// Every variant carries a human readable reason; the `Display` output is the
/// exact line appended to the activity log.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("{provider} not detected. {reason}")]
    ProviderNotDetected { provider: String, reason: String },

    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Approval failed: {reason}")]
    Allowance { reason: String },

    #[error("Place bet failed: {reason}")]
    Submission { reason: String },

    #[error("RPC unavailable: {reason}")]
    Rpc { reason: String },

    #[error("Resolve bet failed: {reason}")]
    Resolution { reason: String },

    #[error("Connect wallet first.")]
    NotConnected,

    #[error("Wallet identity lost: {reason}")]
    IdentityLost { reason: String },

    #[error("Claim failed: {reason}")]
    Claim { reason: String },

    #[error("Invalid guess {0:?}; choose one of 0-9 or a-f")]
    InvalidGuess(String),

    #[error("Invalid bet amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("Number of bets must be a positive integer")]
    InvalidBetCount,

    #[error("Betting is already running")]
    AlreadyRunning,

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl Error {
    /// Run-ending failures. Everything else only aborts the current bet.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::IdentityLost { .. })
    }
}

/// Error reported across the wallet or RPC boundary.
///
/// `code` follows EIP-1193 where the provider supplies one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::with_code(Self::USER_REJECTED, message)
    }

    pub fn unrecognized_chain(chain_id_hex: &str) -> Self {
        Self::with_code(
            Self::UNRECOGNIZED_CHAIN,
            format!(
                "Unrecognized chain ID \"{chain_id_hex}\". Try adding the chain using wallet_addEthereumChain first."
            ),
        )
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == Some(Self::UNRECOGNIZED_CHAIN)
    }
}

impl From<TransportError> for ProviderError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::with_code(payload.code, payload.message.to_string()),
            None => Self::new(err.to_string()),
        }
    }
}
