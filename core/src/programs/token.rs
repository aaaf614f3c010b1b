use bincode::{Decode, Encode};

use crate::account::{decode_args, AccountMeta, AccountState, Instruction, DISCRIMINATOR_LEN};
use crate::error::{
    ArithmeticError, AuthorizationError, MismatchError, PreconditionError, StateError,
};
use crate::identity::Address;
use crate::runtime::{InstructionContext, Program};
use crate::Result;

pub const ID: Address = Address::from_name(b"token");

/// A fungible asset type.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Mint {
    /// `None` once supply is fixed.
    pub mint_authority: Option<Address>,
    pub supply: u64,
    pub decimals: u8,
}

impl AccountState for Mint {
    const NAME: &'static str = "Mint";
    const SPACE: usize = DISCRIMINATOR_LEN + 1 + 32 + 8 + 1;
}

/// A balance of one mint held on behalf of `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

impl AccountState for TokenAccount {
    const NAME: &'static str = "TokenAccount";
    const SPACE: usize = DISCRIMINATOR_LEN + 32 + 32 + 8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TokenInstruction {
    /// Accounts: mint (writable).
    InitializeMint {
        decimals: u8,
        mint_authority: Address,
    },
    /// Accounts: account (writable), mint, owner.
    InitializeAccount,
    /// Accounts: mint (writable), destination (writable), authority (signer).
    MintTo { amount: u64 },
    /// Accounts: source (writable), mint, destination (writable), authority (signer).
    TransferChecked { amount: u64, decimals: u8 },
    /// Accounts: account (writable), destination (writable), authority (signer).
    CloseAccount,
}

pub fn initialize_mint(mint: &Address, mint_authority: &Address, decimals: u8) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &TokenInstruction::InitializeMint {
            decimals,
            mint_authority: *mint_authority,
        },
        vec![AccountMeta::new(*mint, false)],
    )
}

pub fn initialize_account(account: &Address, mint: &Address, owner: &Address) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &TokenInstruction::InitializeAccount,
        vec![
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*owner, false),
        ],
    )
}

pub fn mint_to(
    mint: &Address,
    destination: &Address,
    authority: &Address,
    amount: u64,
) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &TokenInstruction::MintTo { amount },
        vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
    )
}

pub fn transfer_checked(
    source: &Address,
    mint: &Address,
    destination: &Address,
    authority: &Address,
    amount: u64,
    decimals: u8,
) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &TokenInstruction::TransferChecked { amount, decimals },
        vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
    )
}

pub fn close_account(account: &Address, destination: &Address, authority: &Address) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &TokenInstruction::CloseAccount,
        vec![
            AccountMeta::new(*account, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
    )
}

pub struct TokenProgram;

impl Program for TokenProgram {
    fn id(&self) -> Address {
        ID
    }

    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
        match decode_args(data)? {
            TokenInstruction::InitializeMint {
                decimals,
                mint_authority,
            } => process_initialize_mint(ctx, decimals, mint_authority),
            TokenInstruction::InitializeAccount => process_initialize_account(ctx),
            TokenInstruction::MintTo { amount } => process_mint_to(ctx, amount),
            TokenInstruction::TransferChecked { amount, decimals } => {
                process_transfer_checked(ctx, amount, decimals)
            }
            TokenInstruction::CloseAccount => process_close_account(ctx),
        }
    }
}

/// Fails unless `address` is a token-owned account sized for `T` whose data
/// was never written.
fn require_uninitialized<T: AccountState>(
    ctx: &InstructionContext<'_>,
    address: &Address,
) -> Result<()> {
    ctx.require_owner(address, &ID)?;
    let data = &ctx.account(address)?.data;
    if data.len() != T::SPACE {
        return Err(PreconditionError::AccountDataLength {
            expected: T::SPACE,
            actual: data.len(),
        }
        .into());
    }
    if data.iter().any(|b| *b != 0) {
        return Err(StateError::AlreadyExists(*address).into());
    }
    Ok(())
}

fn process_initialize_mint(
    ctx: &mut InstructionContext<'_>,
    decimals: u8,
    mint_authority: Address,
) -> Result<()> {
    let [mint] = ctx.account_metas::<1>()?;
    require_uninitialized::<Mint>(ctx, &mint.address)?;

    ctx.store(
        &mint.address,
        &Mint {
            mint_authority: Some(mint_authority),
            supply: 0,
            decimals,
        },
    )
}

fn process_initialize_account(ctx: &mut InstructionContext<'_>) -> Result<()> {
    let [account, mint, owner] = ctx.account_metas::<3>()?;
    require_uninitialized::<TokenAccount>(ctx, &account.address)?;
    ctx.load::<Mint>(&mint.address, &ID)?;

    ctx.store(
        &account.address,
        &TokenAccount {
            mint: mint.address,
            owner: owner.address,
            amount: 0,
        },
    )
}

fn process_mint_to(ctx: &mut InstructionContext<'_>, amount: u64) -> Result<()> {
    let [mint_meta, destination, authority] = ctx.account_metas::<3>()?;
    let mut mint: Mint = ctx.load(&mint_meta.address, &ID)?;
    let mut dest: TokenAccount = ctx.load(&destination.address, &ID)?;

    let expected = mint
        .mint_authority
        .ok_or(AuthorizationError::FixedSupply(mint_meta.address))?;
    if expected != authority.address {
        return Err(AuthorizationError::OwnerMismatch {
            expected,
            actual: authority.address,
        }
        .into());
    }
    ctx.require_signer(&authority.address)?;
    if dest.mint != mint_meta.address {
        return Err(MismatchError::Mint {
            expected: dest.mint,
            actual: mint_meta.address,
        }
        .into());
    }

    mint.supply = mint
        .supply
        .checked_add(amount)
        .ok_or(ArithmeticError::Overflow)?;
    dest.amount = dest
        .amount
        .checked_add(amount)
        .ok_or(ArithmeticError::Overflow)?;

    ctx.store(&mint_meta.address, &mint)?;
    ctx.store(&destination.address, &dest)
}

fn process_transfer_checked(
    ctx: &mut InstructionContext<'_>,
    amount: u64,
    decimals: u8,
) -> Result<()> {
    let [source_meta, mint_meta, dest_meta, authority] = ctx.account_metas::<4>()?;
    let mut source: TokenAccount = ctx.load(&source_meta.address, &ID)?;
    let mint: Mint = ctx.load(&mint_meta.address, &ID)?;
    let mut dest: TokenAccount = ctx.load(&dest_meta.address, &ID)?;

    if source.mint != mint_meta.address {
        return Err(MismatchError::Mint {
            expected: source.mint,
            actual: mint_meta.address,
        }
        .into());
    }
    if dest.mint != mint_meta.address {
        return Err(MismatchError::Mint {
            expected: dest.mint,
            actual: mint_meta.address,
        }
        .into());
    }
    if decimals != mint.decimals {
        return Err(PreconditionError::DecimalsMismatch {
            expected: mint.decimals,
            actual: decimals,
        }
        .into());
    }
    if source.owner != authority.address {
        return Err(AuthorizationError::OwnerMismatch {
            expected: source.owner,
            actual: authority.address,
        }
        .into());
    }
    ctx.require_signer(&authority.address)?;
    if source.amount < amount {
        return Err(PreconditionError::InsufficientFunds {
            needed: amount,
            available: source.amount,
        }
        .into());
    }
    if source_meta.address == dest_meta.address {
        return Ok(());
    }

    source.amount -= amount;
    dest.amount = dest
        .amount
        .checked_add(amount)
        .ok_or(ArithmeticError::Overflow)?;

    ctx.store(&source_meta.address, &source)?;
    ctx.store(&dest_meta.address, &dest)
}

fn process_close_account(ctx: &mut InstructionContext<'_>) -> Result<()> {
    let [account_meta, destination, authority] = ctx.account_metas::<3>()?;
    let account: TokenAccount = ctx.load(&account_meta.address, &ID)?;

    if account.owner != authority.address {
        return Err(AuthorizationError::OwnerMismatch {
            expected: account.owner,
            actual: authority.address,
        }
        .into());
    }
    ctx.require_signer(&authority.address)?;
    if account.amount != 0 {
        return Err(PreconditionError::NonZeroBalance(account.amount).into());
    }

    ctx.close_account(&account_meta.address, &destination.address)
}
