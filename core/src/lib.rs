/// Accounts, instructions and fixed-layout persisted state
pub mod account;
/// Guarded counter program
pub mod counter;
pub mod error;
/// Two-party escrow swap program
pub mod escrow;
/// Addresses, signatures and keypairs
pub mod identity;
/// JSON persistence helpers for clients
#[cfg(feature = "json")]
pub mod interface;
/// Transaction sequencing and atomic commit
pub mod ledger;
/// Program-derived addresses
pub mod pda;
/// Built-in system, token and associated-token programs
pub mod programs;
/// Program dispatch, cross-program calls and ownership rules
pub mod runtime;
pub mod serde;
/// Per-owner native lamport vault program
pub mod vault;

pub use account::{Account, AccountMeta, AccountState, Instruction, Rent};
pub use error::{ErrorKind, ProgramError, TransactionError};
pub use identity::{Address, Hash, Keypair, Signature};
pub use ledger::{Ledger, Transaction, TransactionReceipt};

pub type Result<T> = std::result::Result<T, ProgramError>;
