use super::{has_one, load_open, release_vault, verify_associated, verify_record_address};
use crate::error::AuthorizationError;
use crate::programs::associated_token;
use crate::runtime::InstructionContext;
use crate::Result;

/// Accounts: maker (signer, writable), escrow (writable), mint offered,
/// vault (writable), maker's offered-mint account (writable),
/// associated-token, token and system programs.
pub(super) fn process(ctx: &mut InstructionContext<'_>) -> Result<()> {
    let [maker, escrow, mint_offered, vault, maker_ata, _, _, _] = ctx.account_metas::<8>()?;

    ctx.require_signer(&maker.address)?;
    let record = load_open(ctx, &escrow.address)?;
    if record.maker != maker.address {
        return Err(AuthorizationError::NotMaker {
            expected: record.maker,
            actual: maker.address,
        }
        .into());
    }
    verify_record_address(&record, &escrow.address)?;
    has_one("mint_offered", &record.mint_offered, &mint_offered.address)?;
    verify_associated(&escrow.address, &mint_offered.address, &vault.address)?;
    verify_associated(&maker.address, &mint_offered.address, &maker_ata.address)?;

    ctx.invoke(&associated_token::create_idempotent(
        &maker.address,
        &maker.address,
        &mint_offered.address,
    )?)?;
    let released = release_vault(
        ctx,
        &record,
        &escrow.address,
        &vault.address,
        &maker_ata.address,
    )?;

    ctx.log(format!(
        "escrow refunded: {} returned {} to {}",
        escrow.address, released, maker.address
    ));
    Ok(())
}
