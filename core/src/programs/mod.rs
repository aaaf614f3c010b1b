//! Built-in programs every ledger ships with.

/// Derived holding accounts per (wallet, mint)
pub mod associated_token;
/// Account creation and native transfers
pub mod system;
/// Fungible token mints and holding accounts
pub mod token;
