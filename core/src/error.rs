use thiserror::Error;

use crate::identity::{Address, Hash, Signature};

/// Failure categories every program error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed parameters or missing signer; rejected before any mutation.
    PreconditionViolation,
    /// Caller is not the expected authority, maker or owner.
    AuthorizationFailure,
    /// Record already exists, or is not open.
    StateConflict,
    /// A supplied account does not match the derived or stored one.
    AccountMismatch,
    /// Arithmetic bound would be crossed.
    ArithmeticGuard,
}

/// Errors raised while executing a single instruction.
///
/// Any of these aborts the whole enclosing transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("precondition violated: {0}")]
    Precondition(PreconditionError),

    #[error("authorization failed: {0}")]
    Authorization(AuthorizationError),

    #[error("state conflict: {0}")]
    StateConflict(StateError),

    #[error("account mismatch: {0}")]
    AccountMismatch(MismatchError),

    #[error("{0}")]
    Arithmetic(ArithmeticError),
}

impl ProgramError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) => ErrorKind::PreconditionViolation,
            Self::Authorization(_) => ErrorKind::AuthorizationFailure,
            Self::StateConflict(_) => ErrorKind::StateConflict,
            Self::AccountMismatch(_) => ErrorKind::AccountMismatch,
            Self::Arithmetic(_) => ErrorKind::ArithmeticGuard,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("missing required signature for {0}")]
    MissingSigner(Address),

    #[error("account {0} must be writable")]
    NotWritable(Address),

    #[error("not enough account keys: expected {expected}, got {actual}")]
    NotEnoughAccounts { expected: usize, actual: usize },

    #[error("account {0} was not supplied to the instruction")]
    MissingAccount(Address),

    #[error("invalid instruction data")]
    InvalidInstructionData,

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("insufficient lamports: need {needed}, have {available}")]
    InsufficientLamports { needed: u64, available: u64 },

    #[error("mint decimals mismatch: expected {expected}, got {actual}")]
    DecimalsMismatch { expected: u8, actual: u8 },

    #[error("token account still holds {0} units")]
    NonZeroBalance(u64),

    #[error("account data too small: need {needed} bytes, have {actual}")]
    AccountDataTooSmall { needed: usize, actual: usize },

    #[error("account data must be exactly {expected} bytes, got {actual}")]
    AccountDataLength { expected: usize, actual: usize },

    #[error("transfer source {0} must not carry data")]
    SourceCarriesData(Address),

    #[error("cross-program call depth exceeded")]
    CallDepthExceeded,

    #[error("program {0} is not registered")]
    UnknownProgram(Address),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("signer {actual} is not the escrow maker {expected}")]
    NotMaker { expected: Address, actual: Address },

    #[error("signer {actual} is not the record authority {expected}")]
    AuthorityMismatch { expected: Address, actual: Address },

    #[error("signer {actual} is not the owner {expected}")]
    OwnerMismatch { expected: Address, actual: Address },

    #[error("mint {0} has no mint authority")]
    FixedSupply(Address),

    #[error("cross-program call escalated privileges of {0}")]
    PrivilegeEscalation(Address),

    #[error("read-only account {0} was modified")]
    ReadonlyModified(Address),

    #[error("account {0} was modified by a program that does not own it")]
    ExternalAccountModified(Address),

    #[error("illegal owner change of account {0}")]
    IllegalOwnerChange(Address),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("record {0} already exists")]
    AlreadyExists(Address),

    #[error("account {0} is already in use")]
    AccountInUse(Address),

    #[error("record {0} is not open")]
    NotOpen(Address),

    #[error("record {0} is not initialized")]
    NotInitialized(Address),

    #[error("vault {0} holds no lamports")]
    VaultEmpty(Address),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MismatchError {
    #[error("account address mismatch: expected {expected}, got {actual}")]
    Address { expected: Address, actual: Address },

    #[error("account {address} owner mismatch: expected {expected}, got {actual}")]
    Owner {
        address: Address,
        expected: Address,
        actual: Address,
    },

    #[error("mint mismatch: expected {expected}, got {actual}")]
    Mint { expected: Address, actual: Address },

    #[error("`{field}` mismatch: record holds {expected}, got {actual}")]
    HasOne {
        field: &'static str,
        expected: Address,
        actual: Address,
    },

    #[error("account {0} holds unexpected data")]
    Discriminator(Address),

    #[error("invalid seeds: {0}")]
    Seeds(#[from] PdaError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Counter cannot go below zero")]
    CountBelowZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("instruction changed the lamport total")]
    UnbalancedInstruction,
}

/// Errors from program address derivation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PdaError {
    #[error("too many seeds: {0}")]
    MaxSeedsExceeded(usize),

    #[error("seed of {0} bytes exceeds the 32-byte limit")]
    MaxSeedLengthExceeded(usize),

    #[error("derived address lies on the ed25519 curve")]
    OnCurve,

    #[error("no viable bump seed found")]
    NoViableBump,
}

/// Errors that might occur while parsing into an [`Address`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid base58: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("cannot parse identity from empty string")]
    EmptyIdentity,

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid keypair bytes")]
    InvalidKeypair,
}

/// Rejections raised by the ledger before, during or after execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction carries no instructions")]
    Empty,

    #[error("transaction carries no signatures")]
    Unsigned,

    #[error("blockhash {0} not found")]
    BlockhashNotFound(Hash),

    #[error("transaction {0} already processed")]
    AlreadyProcessed(Signature),

    #[error("signature verification failed for {0}")]
    SignatureFailure(Address),

    #[error("missing signature for {0}")]
    MissingSignature(Address),

    #[error("instruction {index} failed: {error}")]
    InstructionError { index: usize, error: ProgramError },
}

impl TransactionError {
    /// The program error behind an instruction failure, if that is what this is.
    pub fn program_error(&self) -> Option<&ProgramError> {
        match self {
            Self::InstructionError { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<PreconditionError> for ProgramError {
    fn from(value: PreconditionError) -> Self {
        Self::Precondition(value)
    }
}

impl From<AuthorizationError> for ProgramError {
    fn from(value: AuthorizationError) -> Self {
        Self::Authorization(value)
    }
}

impl From<StateError> for ProgramError {
    fn from(value: StateError) -> Self {
        Self::StateConflict(value)
    }
}

impl From<MismatchError> for ProgramError {
    fn from(value: MismatchError) -> Self {
        Self::AccountMismatch(value)
    }
}

impl From<ArithmeticError> for ProgramError {
    fn from(value: ArithmeticError) -> Self {
        Self::Arithmetic(value)
    }
}

impl From<PdaError> for ProgramError {
    fn from(value: PdaError) -> Self {
        Self::AccountMismatch(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        let err: ProgramError = PreconditionError::ZeroAmount.into();
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);

        let err: ProgramError = PdaError::OnCurve.into();
        assert_eq!(err.kind(), ErrorKind::AccountMismatch);

        let err: ProgramError = ArithmeticError::CountBelowZero.into();
        assert_eq!(err.kind(), ErrorKind::ArithmeticGuard);
        assert_eq!(err.to_string(), "Counter cannot go below zero");
    }

    #[test]
    fn instruction_error_exposes_cause() {
        let tx_err = TransactionError::InstructionError {
            index: 1,
            error: StateError::NotOpen(Address::default()).into(),
        };
        assert_eq!(
            tx_err.program_error().map(ProgramError::kind),
            Some(ErrorKind::StateConflict)
        );
        assert!(TransactionError::Empty.program_error().is_none());
    }
}
