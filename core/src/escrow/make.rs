use super::instruction::MakeArgs;
use super::{find_escrow_address, verify_associated, EscrowRecord, ESCROW_PREFIX, ID};
use crate::account::AccountState;
use crate::error::{MismatchError, PreconditionError, StateError};
use crate::programs::token::{self, Mint};
use crate::programs::{associated_token, system};
use crate::runtime::InstructionContext;
use crate::Result;

/// Accounts: maker (signer, writable), escrow (writable), mint offered,
/// mint requested, maker's offered-mint account (writable), vault
/// (writable), associated-token, token and system programs.
pub(super) fn process(ctx: &mut InstructionContext<'_>, args: MakeArgs) -> Result<()> {
    let [maker, escrow, mint_offered, mint_requested, maker_ata, vault, _, _, _] =
        ctx.account_metas::<9>()?;

    ctx.require_signer(&maker.address)?;
    if args.amount_offered == 0 || args.amount_requested == 0 {
        return Err(PreconditionError::ZeroAmount.into());
    }

    let (expected, bump) = find_escrow_address(&maker.address, args.seed)?;
    if escrow.address != expected {
        return Err(MismatchError::Address {
            expected,
            actual: escrow.address,
        }
        .into());
    }
    // a record exists once this program owns the address; stray lamports do not count
    if ctx.account(&escrow.address)?.is_owned_by(&ID) {
        return Err(StateError::AlreadyExists(escrow.address).into());
    }
    verify_associated(&escrow.address, &mint_offered.address, &vault.address)?;

    let offered: Mint = ctx.load(&mint_offered.address, &token::ID)?;
    ctx.load::<Mint>(&mint_requested.address, &token::ID)?;

    let seed = args.seed.to_le_bytes();
    system::create_account_in(
        ctx,
        &maker.address,
        &escrow.address,
        EscrowRecord::SPACE,
        &ID,
        &[&[ESCROW_PREFIX, maker.address.as_ref(), &seed, &[bump]]],
    )?;
    ctx.store(
        &escrow.address,
        &EscrowRecord {
            seed: args.seed,
            maker: maker.address,
            mint_offered: mint_offered.address,
            mint_requested: mint_requested.address,
            amount_requested: args.amount_requested,
            bump,
        },
    )?;

    ctx.invoke(&associated_token::create(
        &maker.address,
        &escrow.address,
        &mint_offered.address,
    )?)?;
    ctx.invoke(&token::transfer_checked(
        &maker_ata.address,
        &mint_offered.address,
        &vault.address,
        &maker.address,
        args.amount_offered,
        offered.decimals,
    ))?;

    ctx.log(format!(
        "escrow made: {} locks {} of {} for {} of {}",
        escrow.address,
        args.amount_offered,
        mint_offered.address,
        args.amount_requested,
        mint_requested.address
    ));
    Ok(())
}
