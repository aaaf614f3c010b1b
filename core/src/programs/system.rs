use bincode::{Decode, Encode};

use crate::account::{decode_args, AccountMeta, Instruction};
use crate::error::{ArithmeticError, PreconditionError, StateError};
use crate::identity::Address;
use crate::runtime::{InstructionContext, Program};
use crate::Result;

/// The system program owns every fresh account.
pub const ID: Address = Address::new_from_array([0u8; 32]);

/// Largest data allocation a single account may request.
pub const MAX_ACCOUNT_DATA_LEN: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum SystemInstruction {
    /// Funds and allocates a new account and assigns it to `owner`.
    ///
    /// Accounts: funder (signer, writable), new account (signer, writable).
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: Address,
    },
    /// Moves lamports between two accounts.
    ///
    /// Accounts: source (signer, writable), destination (writable).
    Transfer { lamports: u64 },
    /// Gives a system-owned account without data `space` zeroed bytes.
    ///
    /// Accounts: account (signer, writable).
    Allocate { space: u64 },
    /// Hands a system-owned account to `owner`.
    ///
    /// Accounts: account (signer, writable).
    Assign { owner: Address },
}

pub fn create_account(
    funder: &Address,
    new_account: &Address,
    lamports: u64,
    space: u64,
    owner: &Address,
) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &SystemInstruction::CreateAccount {
            lamports,
            space,
            owner: *owner,
        },
        vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(*new_account, true),
        ],
    )
}

pub fn transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &SystemInstruction::Transfer { lamports },
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
    )
}

pub fn allocate(account: &Address, space: u64) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &SystemInstruction::Allocate { space },
        vec![AccountMeta::new(*account, true)],
    )
}

pub fn assign(account: &Address, owner: &Address) -> Instruction {
    Instruction::new_with_bincode(
        ID,
        &SystemInstruction::Assign { owner: *owner },
        vec![AccountMeta::new(*account, true)],
    )
}

/// Opens `target` with `space` bytes owned by `owner`, signing for it with
/// `signer_seeds` when it is a derived address.
///
/// Lamports sent to the address beforehand do not block creation: the
/// account is topped up to the rent minimum, then allocated and assigned.
pub fn create_account_in(
    ctx: &mut InstructionContext<'_>,
    payer: &Address,
    target: &Address,
    space: usize,
    owner: &Address,
    signer_seeds: &[&[&[u8]]],
) -> Result<()> {
    let existing = ctx.account(target)?;
    if !existing.data.is_empty() || !existing.is_owned_by(&ID) {
        return Err(StateError::AccountInUse(*target).into());
    }
    let lamports = ctx.rent().minimum_balance(space);
    let funded = existing.lamports;

    if funded == 0 {
        return ctx.invoke_signed(
            &create_account(payer, target, lamports, space as u64, owner),
            signer_seeds,
        );
    }
    let top_up = lamports.saturating_sub(funded);
    if top_up > 0 {
        ctx.invoke(&transfer(payer, target, top_up))?;
    }
    ctx.invoke_signed(&allocate(target, space as u64), signer_seeds)?;
    ctx.invoke_signed(&assign(target, owner), signer_seeds)
}

pub struct SystemProgram;

impl Program for SystemProgram {
    fn id(&self) -> Address {
        ID
    }

    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
        match decode_args(data)? {
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => process_create_account(ctx, lamports, space, owner),
            SystemInstruction::Transfer { lamports } => process_transfer(ctx, lamports),
            SystemInstruction::Allocate { space } => process_allocate(ctx, space),
            SystemInstruction::Assign { owner } => process_assign(ctx, owner),
        }
    }
}

fn process_create_account(
    ctx: &mut InstructionContext<'_>,
    lamports: u64,
    space: u64,
    owner: Address,
) -> Result<()> {
    let [funder, new_account] = ctx.account_metas::<2>()?;
    ctx.require_signer(&funder.address)?;
    ctx.require_signer(&new_account.address)?;

    let target = ctx.account(&new_account.address)?;
    if !target.is_empty() || !target.is_owned_by(&ID) {
        return Err(StateError::AccountInUse(new_account.address).into());
    }
    if space > MAX_ACCOUNT_DATA_LEN {
        return Err(PreconditionError::InvalidInstructionData.into());
    }

    debit(ctx, &funder.address, lamports)?;
    let account = ctx.account_mut(&new_account.address)?;
    account.lamports = lamports;
    account.data = vec![0u8; space as usize];
    account.owner = owner;
    Ok(())
}

fn process_transfer(ctx: &mut InstructionContext<'_>, lamports: u64) -> Result<()> {
    let [from, to] = ctx.account_metas::<2>()?;
    ctx.require_signer(&from.address)?;

    debit(ctx, &from.address, lamports)?;
    let dest = ctx.account_mut(&to.address)?;
    dest.lamports = dest
        .lamports
        .checked_add(lamports)
        .ok_or(ArithmeticError::Overflow)?;
    Ok(())
}

fn process_allocate(ctx: &mut InstructionContext<'_>, space: u64) -> Result<()> {
    let [account] = ctx.account_metas::<1>()?;
    ctx.require_signer(&account.address)?;

    let target = ctx.account(&account.address)?;
    if !target.data.is_empty() || !target.is_owned_by(&ID) {
        return Err(StateError::AccountInUse(account.address).into());
    }
    if space > MAX_ACCOUNT_DATA_LEN {
        return Err(PreconditionError::InvalidInstructionData.into());
    }

    ctx.account_mut(&account.address)?.data = vec![0u8; space as usize];
    Ok(())
}

fn process_assign(ctx: &mut InstructionContext<'_>, owner: Address) -> Result<()> {
    let [account] = ctx.account_metas::<1>()?;
    ctx.require_signer(&account.address)?;
    ctx.require_owner(&account.address, &ID)?;

    ctx.account_mut(&account.address)?.owner = owner;
    Ok(())
}

/// Takes `lamports` from a plain system account.
fn debit(ctx: &mut InstructionContext<'_>, from: &Address, lamports: u64) -> Result<()> {
    let source = ctx.account_mut(from)?;
    if !source.data.is_empty() {
        return Err(PreconditionError::SourceCarriesData(*from).into());
    }
    source.lamports = source.lamports.checked_sub(lamports).ok_or(
        PreconditionError::InsufficientLamports {
            needed: lamports,
            available: source.lamports,
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::error::MismatchError;
    use crate::runtime::{execute, AccountStore, ProgramRegistry};

    const PAYER: Address = Address::new_from_array([1u8; 32]);
    const TARGET: Address = Address::new_from_array([2u8; 32]);
    const PROGRAM: Address = Address::from_name(b"someone");

    fn run(store: &mut AccountStore, ix: &Instruction) -> Result<()> {
        let registry = ProgramRegistry::with_builtins();
        execute(store, &registry, &mut Vec::new(), ix, 0)
    }

    fn store(target_lamports: u64) -> AccountStore {
        let mut store = AccountStore::new();
        store.insert(PAYER, Account::new(10_000, 0, &ID));
        store.insert(TARGET, Account::new(target_lamports, 0, &ID));
        store
    }

    #[test]
    fn create_account_refuses_funded_target() {
        let mut store = store(1);
        assert_eq!(
            run(&mut store, &create_account(&PAYER, &TARGET, 5_000, 16, &PROGRAM)),
            Err(StateError::AccountInUse(TARGET).into())
        );

        let mut store = self::store(0);
        run(&mut store, &create_account(&PAYER, &TARGET, 5_000, 16, &PROGRAM)).unwrap();
        assert_eq!(store[&TARGET].owner, PROGRAM);
        assert_eq!(store[&TARGET].data.len(), 16);
        assert_eq!(store[&PAYER].lamports, 5_000);
    }

    #[test]
    fn allocate_then_assign() {
        let mut store = store(5_000);
        run(&mut store, &allocate(&TARGET, 16)).unwrap();
        assert_eq!(store[&TARGET].data, vec![0u8; 16]);
        assert_eq!(
            run(&mut store, &allocate(&TARGET, 8)),
            Err(StateError::AccountInUse(TARGET).into())
        );

        run(&mut store, &assign(&TARGET, &PROGRAM)).unwrap();
        assert_eq!(store[&TARGET].owner, PROGRAM);
        assert_eq!(store[&TARGET].lamports, 5_000);
        assert_eq!(
            run(&mut store, &assign(&TARGET, &ID)),
            Err(MismatchError::Owner {
                address: TARGET,
                expected: ID,
                actual: PROGRAM,
            }
            .into())
        );
    }

    #[test]
    fn allocate_and_assign_need_the_account_signature() {
        let mut store = store(5_000);
        let mut ix = allocate(&TARGET, 16);
        ix.accounts[0].is_signer = false;
        assert_eq!(
            run(&mut store, &ix),
            Err(PreconditionError::MissingSigner(TARGET).into())
        );

        let mut ix = assign(&TARGET, &PROGRAM);
        ix.accounts[0].is_signer = false;
        assert_eq!(
            run(&mut store, &ix),
            Err(PreconditionError::MissingSigner(TARGET).into())
        );
        assert_eq!(store[&TARGET], Account::new(5_000, 0, &ID));
    }
}
