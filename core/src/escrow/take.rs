use super::{has_one, load_open, release_vault, verify_associated, verify_record_address};
use crate::programs::associated_token;
use crate::programs::token::{self, Mint};
use crate::runtime::InstructionContext;
use crate::Result;

/// Accounts: taker (signer, writable), maker (writable), escrow (writable),
/// mint offered, mint requested, vault (writable), taker's offered-mint
/// account (writable), taker's requested-mint account (writable), maker's
/// requested-mint account (writable), associated-token, token and system
/// programs.
pub(super) fn process(ctx: &mut InstructionContext<'_>) -> Result<()> {
    let [
        taker,
        maker,
        escrow,
        mint_offered,
        mint_requested,
        vault,
        taker_ata_offered,
        taker_ata_requested,
        maker_ata_requested,
        _,
        _,
        _,
    ] = ctx.account_metas::<12>()?;

    ctx.require_signer(&taker.address)?;
    let record = load_open(ctx, &escrow.address)?;
    verify_record_address(&record, &escrow.address)?;

    has_one("maker", &record.maker, &maker.address)?;
    has_one("mint_offered", &record.mint_offered, &mint_offered.address)?;
    has_one("mint_requested", &record.mint_requested, &mint_requested.address)?;

    verify_associated(&escrow.address, &mint_offered.address, &vault.address)?;
    verify_associated(
        &maker.address,
        &mint_requested.address,
        &maker_ata_requested.address,
    )?;
    verify_associated(
        &taker.address,
        &mint_offered.address,
        &taker_ata_offered.address,
    )?;

    // taker pays the maker
    let requested: Mint = ctx.load(&mint_requested.address, &token::ID)?;
    ctx.invoke(&associated_token::create_idempotent(
        &taker.address,
        &maker.address,
        &mint_requested.address,
    )?)?;
    ctx.invoke(&token::transfer_checked(
        &taker_ata_requested.address,
        &mint_requested.address,
        &maker_ata_requested.address,
        &taker.address,
        record.amount_requested,
        requested.decimals,
    ))?;

    ctx.invoke(&associated_token::create_idempotent(
        &taker.address,
        &taker.address,
        &mint_offered.address,
    )?)?;
    let released = release_vault(
        ctx,
        &record,
        &escrow.address,
        &vault.address,
        &taker_ata_offered.address,
    )?;

    ctx.log(format!(
        "escrow taken: {} paid {} and received {} from {}",
        taker.address, record.amount_requested, released, escrow.address
    ));
    Ok(())
}
