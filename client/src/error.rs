use trustswap_core::error::PdaError;
use trustswap_core::{Address, ProgramError, TransactionError};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Transaction rejected: {0}")]
    Transaction(#[from] TransactionError),
    #[error("No escrow open at {0}")]
    EscrowNotFound(Address),
    #[error("No counter at {0}")]
    CounterNotFound(Address),
    #[error("Invalid account data: {0}")]
    AccountData(#[from] ProgramError),
    #[error("Address derivation failed: {0}")]
    Derivation(#[from] PdaError),
}
