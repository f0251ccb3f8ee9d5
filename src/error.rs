use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a distribution run.
///
/// Per-recipient failures are not errors: they end up as a
/// [`TransferOutcome`](crate::retry::TransferOutcome) and are logged.
#[derive(Error, Debug)]
pub enum DistributorError {
    #[error("Invalid address list line {line}: {reason}")]
    InvalidLedgerLine { line: usize, reason: String },

    #[error("Duplicate recipient {recipient} on line {line} (first seen on line {first_line})")]
    DuplicateRecipient {
        recipient: Pubkey,
        line: usize,
        first_line: usize,
    },

    #[error("Address list is empty")]
    EmptyLedger,

    #[error("Sum of recipient balances is zero, cannot compute a proportional drop")]
    ZeroTotalBalance,

    #[error("Invalid drop amount {0}: must be a positive number")]
    InvalidDropAmount(f64),

    #[error("Failed to read the current wallet address: {0}")]
    WalletAddress(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Aborted(String),

    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Interrupted, exiting.")]
    Interrupted,
}

impl DistributorError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DistributorError::Interrupted => 130,
            _ => 1,
        }
    }
}
