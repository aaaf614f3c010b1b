use bincode::{Decode, Encode};

use crate::account::{decode_args, AccountMeta, AccountState, Instruction};
use crate::error::{AuthorizationError, MismatchError, PdaError, StateError};
use crate::identity::Address;
use crate::pda::associated_token_address;
use crate::programs::{system, token};
use crate::runtime::{InstructionContext, Program};
use crate::Result;

pub const ID: Address = Address::from_name(b"associated-token");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum AssociatedTokenInstruction {
    /// Fails if the account already exists.
    Create,
    /// Succeeds without change if a matching account already exists.
    CreateIdempotent,
}

fn build(
    payer: &Address,
    wallet: &Address,
    mint: &Address,
    kind: AssociatedTokenInstruction,
) -> std::result::Result<Instruction, PdaError> {
    let (address, _) = associated_token_address(wallet, mint)?;
    Ok(Instruction::new_with_bincode(
        ID,
        &kind,
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(address, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system::ID, false),
            AccountMeta::new_readonly(token::ID, false),
        ],
    ))
}

pub fn create(
    payer: &Address,
    wallet: &Address,
    mint: &Address,
) -> std::result::Result<Instruction, PdaError> {
    build(payer, wallet, mint, AssociatedTokenInstruction::Create)
}

pub fn create_idempotent(
    payer: &Address,
    wallet: &Address,
    mint: &Address,
) -> std::result::Result<Instruction, PdaError> {
    build(
        payer,
        wallet,
        mint,
        AssociatedTokenInstruction::CreateIdempotent,
    )
}

pub struct AssociatedTokenProgram;

impl Program for AssociatedTokenProgram {
    fn id(&self) -> Address {
        ID
    }

    /// Accounts: payer (signer, writable), associated account (writable),
    /// wallet, mint, system program, token program.
    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
        let kind: AssociatedTokenInstruction = decode_args(data)?;
        let [payer, holder, wallet, mint, _, _] = ctx.account_metas::<6>()?;

        let (expected, bump) = associated_token_address(&wallet.address, &mint.address)?;
        if holder.address != expected {
            return Err(MismatchError::Address {
                expected,
                actual: holder.address,
            }
            .into());
        }

        // lamports alone do not make an account; only data or a new owner do
        let existing = ctx.account(&holder.address)?;
        if !existing.data.is_empty() || !existing.is_owned_by(&system::ID) {
            if kind == AssociatedTokenInstruction::CreateIdempotent {
                let existing: token::TokenAccount = ctx.load(&holder.address, &token::ID)?;
                if existing.mint != mint.address {
                    return Err(MismatchError::Mint {
                        expected: mint.address,
                        actual: existing.mint,
                    }
                    .into());
                }
                if existing.owner != wallet.address {
                    return Err(AuthorizationError::OwnerMismatch {
                        expected: wallet.address,
                        actual: existing.owner,
                    }
                    .into());
                }
                return Ok(());
            }
            return Err(StateError::AccountInUse(holder.address).into());
        }

        system::create_account_in(
            ctx,
            &payer.address,
            &holder.address,
            token::TokenAccount::SPACE,
            &token::ID,
            &[&[
                wallet.address.as_ref(),
                token::ID.as_ref(),
                mint.address.as_ref(),
                &[bump],
            ]],
        )?;
        ctx.invoke(&token::initialize_account(
            &holder.address,
            &mint.address,
            &wallet.address,
        ))
    }
}
