use ethers::types::H256;
use thiserror::Error;

/// Errors surfaced by the deployment flow. None of them are recovered locally.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The named contract could not be turned into a deployable factory.
    #[error("Could not resolve contract `{contract}`: {reason}")]
    Resolution { contract: String, reason: String },

    /// The deployment transaction was rejected, reverted, or never left this process.
    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Transaction {tx_hash:?} was not confirmed: {reason}")]
    ConfirmationTimeout { tx_hash: H256, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    pub(crate) fn resolution(contract: &str, reason: impl Into<String>) -> Self {
        DeployError::Resolution {
            contract: contract.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
