//! Two-party swap state machine: `Make` locks the offered asset in a vault
//! owned by a derived record, then exactly one of `Take` or `Refund` releases
//! it and closes both accounts.

use crate::account::decode_args;
use crate::error::{MismatchError, PdaError, PreconditionError, StateError};
use crate::identity::Address;
use crate::pda::{associated_token_address, create_program_address, find_program_address};
use crate::programs::system;
use crate::programs::token::{self, Mint, TokenAccount};
use crate::runtime::{InstructionContext, Program};
use crate::Result;

/// Instruction builders and tags
pub mod instruction;
mod make;
mod refund;
/// Persisted record layout
pub mod state;
mod take;

pub use state::{EscrowRecord, EscrowState};

pub const ID: Address = Address::from_name(b"escrow");

/// First seed of every escrow record address.
pub const ESCROW_PREFIX: &[u8] = b"escrow";

/// Record address and bump for (`maker`, `seed`).
pub fn find_escrow_address(
    maker: &Address,
    seed: u64,
) -> std::result::Result<(Address, u8), PdaError> {
    find_program_address(&[ESCROW_PREFIX, maker.as_ref(), &seed.to_le_bytes()], &ID)
}

pub fn escrow_address(maker: &Address, seed: u64) -> std::result::Result<Address, PdaError> {
    find_escrow_address(maker, seed).map(|(address, _)| address)
}

/// The vault is the record's associated account for the offered mint.
pub fn vault_address(
    escrow: &Address,
    mint_offered: &Address,
) -> std::result::Result<Address, PdaError> {
    associated_token_address(escrow, mint_offered).map(|(address, _)| address)
}

pub struct EscrowProgram;

impl Program for EscrowProgram {
    fn id(&self) -> Address {
        ID
    }

    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
        let (tag, args) = data
            .split_first()
            .ok_or(PreconditionError::InvalidInstructionData)?;
        match *tag {
            instruction::MAKE => make::process(ctx, decode_args(args)?),
            instruction::TAKE => take::process(ctx),
            instruction::REFUND => refund::process(ctx),
            _ => Err(PreconditionError::InvalidInstructionData.into()),
        }
    }
}

/// Reads the record at `escrow`; a missing or closed record is not open, even
/// if lamports were sent to its address since.
fn load_open(ctx: &InstructionContext<'_>, escrow: &Address) -> Result<EscrowRecord> {
    let account = ctx.account(escrow)?;
    if account.data.is_empty() && account.is_owned_by(&system::ID) {
        return Err(StateError::NotOpen(*escrow).into());
    }
    ctx.load(escrow, &ID)
}

/// Re-derives the record address from its own stored seeds.
fn verify_record_address(record: &EscrowRecord, escrow: &Address) -> Result<()> {
    let derived = create_program_address(
        &[
            ESCROW_PREFIX,
            record.maker.as_ref(),
            &record.seed.to_le_bytes(),
            &[record.bump],
        ],
        &ID,
    )?;
    if derived != *escrow {
        return Err(MismatchError::Address {
            expected: derived,
            actual: *escrow,
        }
        .into());
    }
    Ok(())
}

fn has_one(field: &'static str, expected: &Address, actual: &Address) -> Result<()> {
    if expected != actual {
        return Err(MismatchError::HasOne {
            field,
            expected: *expected,
            actual: *actual,
        }
        .into());
    }
    Ok(())
}

/// Fails unless `actual` is the associated account of `wallet` for `mint`.
fn verify_associated(wallet: &Address, mint: &Address, actual: &Address) -> Result<()> {
    let (expected, _) = associated_token_address(wallet, mint)?;
    if expected != *actual {
        return Err(MismatchError::Address {
            expected,
            actual: *actual,
        }
        .into());
    }
    Ok(())
}

/// Sends the whole vault balance to `destination`, then closes the vault and
/// the record, returning both deposits to the maker.
fn release_vault(
    ctx: &mut InstructionContext<'_>,
    record: &EscrowRecord,
    escrow: &Address,
    vault: &Address,
    destination: &Address,
) -> Result<u64> {
    let amount = ctx.load::<TokenAccount>(vault, &token::ID)?.amount;
    let decimals = ctx.load::<Mint>(&record.mint_offered, &token::ID)?.decimals;

    let seed = record.seed.to_le_bytes();
    let bump = [record.bump];
    let signer: &[&[u8]] = &[ESCROW_PREFIX, record.maker.as_ref(), &seed, &bump];

    if amount > 0 {
        ctx.invoke_signed(
            &token::transfer_checked(
                vault,
                &record.mint_offered,
                destination,
                escrow,
                amount,
                decimals,
            ),
            &[signer],
        )?;
    }
    ctx.invoke_signed(&token::close_account(vault, &record.maker, escrow), &[signer])?;
    ctx.close_account(escrow, &record.maker)?;
    Ok(amount)
}
