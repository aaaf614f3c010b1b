//! Instruction builders for the escrow program.

use bincode::{Decode, Encode};

use super::{escrow_address, vault_address, ID};
use crate::account::{AccountMeta, Instruction};
use crate::error::PdaError;
use crate::identity::Address;
use crate::pda::associated_token_address;
use crate::programs::{associated_token, system, token};

pub const MAKE: u8 = 0;
pub const TAKE: u8 = 1;
pub const REFUND: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct MakeArgs {
    pub seed: u64,
    pub amount_requested: u64,
    pub amount_offered: u64,
}

fn ata(wallet: &Address, mint: &Address) -> Result<Address, PdaError> {
    associated_token_address(wallet, mint).map(|(address, _)| address)
}

fn programs() -> [AccountMeta; 3] {
    [
        AccountMeta::new_readonly(associated_token::ID, false),
        AccountMeta::new_readonly(token::ID, false),
        AccountMeta::new_readonly(system::ID, false),
    ]
}

/// Opens an offer of `args.amount_offered` units of `mint_offered` for
/// `args.amount_requested` units of `mint_requested`.
pub fn make(
    maker: &Address,
    mint_offered: &Address,
    mint_requested: &Address,
    args: MakeArgs,
) -> Result<Instruction, PdaError> {
    let escrow = escrow_address(maker, args.seed)?;
    let mut accounts = vec![
        AccountMeta::new(*maker, true),
        AccountMeta::new(escrow, false),
        AccountMeta::new_readonly(*mint_offered, false),
        AccountMeta::new_readonly(*mint_requested, false),
        AccountMeta::new(ata(maker, mint_offered)?, false),
        AccountMeta::new(vault_address(&escrow, mint_offered)?, false),
    ];
    accounts.extend(programs());
    Ok(Instruction::new_with_tag(ID, MAKE, &args, accounts))
}

/// Fills the offer at `escrow`. The remaining addresses must match the
/// stored record.
pub fn take(
    taker: &Address,
    maker: &Address,
    escrow: &Address,
    mint_offered: &Address,
    mint_requested: &Address,
) -> Result<Instruction, PdaError> {
    let mut accounts = vec![
        AccountMeta::new(*taker, true),
        AccountMeta::new(*maker, false),
        AccountMeta::new(*escrow, false),
        AccountMeta::new_readonly(*mint_offered, false),
        AccountMeta::new_readonly(*mint_requested, false),
        AccountMeta::new(vault_address(escrow, mint_offered)?, false),
        AccountMeta::new(ata(taker, mint_offered)?, false),
        AccountMeta::new(ata(taker, mint_requested)?, false),
        AccountMeta::new(ata(maker, mint_requested)?, false),
    ];
    accounts.extend(programs());
    Ok(Instruction::new_with_tag(ID, TAKE, &(), accounts))
}

/// Cancels the offer at `escrow` and returns the vault contents to `maker`.
pub fn refund(
    maker: &Address,
    escrow: &Address,
    mint_offered: &Address,
) -> Result<Instruction, PdaError> {
    let mut accounts = vec![
        AccountMeta::new(*maker, true),
        AccountMeta::new(*escrow, false),
        AccountMeta::new_readonly(*mint_offered, false),
        AccountMeta::new(vault_address(escrow, mint_offered)?, false),
        AccountMeta::new(ata(maker, mint_offered)?, false),
    ];
    accounts.extend(programs());
    Ok(Instruction::new_with_tag(ID, REFUND, &(), accounts))
}
