//! Native lamport vault: every owner parks lamports at the address derived
//! from `["vault", owner]`, and only that owner can pull them back out.

use crate::account::{decode_args, AccountMeta, Instruction};
use crate::error::{MismatchError, PdaError, PreconditionError, StateError};
use crate::identity::Address;
use crate::pda::find_program_address;
use crate::programs::system;
use crate::runtime::{InstructionContext, Program};
use crate::Result;

pub const ID: Address = Address::from_name(b"vault");

/// First seed of every vault address.
pub const VAULT_PREFIX: &[u8] = b"vault";

pub const DEPOSIT: u8 = 0;
pub const WITHDRAW: u8 = 1;

/// Vault address and bump for `owner`.
pub fn find_vault_address(owner: &Address) -> std::result::Result<(Address, u8), PdaError> {
    find_program_address(&[VAULT_PREFIX, owner.as_ref()], &ID)
}

fn accounts(owner: &Address) -> std::result::Result<Vec<AccountMeta>, PdaError> {
    let (vault, _) = find_vault_address(owner)?;
    Ok(vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new(vault, false),
        AccountMeta::new_readonly(system::ID, false),
    ])
}

/// Moves `lamports` from `owner` into its vault.
pub fn deposit(owner: &Address, lamports: u64) -> std::result::Result<Instruction, PdaError> {
    Ok(Instruction::new_with_tag(ID, DEPOSIT, &lamports, accounts(owner)?))
}

/// Empties the vault of `owner` back into `owner`.
pub fn withdraw(owner: &Address) -> std::result::Result<Instruction, PdaError> {
    Ok(Instruction::new_with_tag(ID, WITHDRAW, &(), accounts(owner)?))
}

pub struct VaultProgram;

impl Program for VaultProgram {
    fn id(&self) -> Address {
        ID
    }

    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
        let (tag, args) = data
            .split_first()
            .ok_or(PreconditionError::InvalidInstructionData)?;
        match *tag {
            DEPOSIT => process_deposit(ctx, decode_args(args)?),
            WITHDRAW => process_withdraw(ctx),
            _ => Err(PreconditionError::InvalidInstructionData.into()),
        }
    }
}

/// Re-derives the vault of `owner` and checks it is still a plain system
/// account. Returns the bump.
fn verify_vault(ctx: &InstructionContext<'_>, owner: &Address, vault: &Address) -> Result<u8> {
    let (expected, bump) = find_vault_address(owner)?;
    if expected != *vault {
        return Err(MismatchError::Address {
            expected,
            actual: *vault,
        }
        .into());
    }
    ctx.require_owner(vault, &system::ID)?;
    if !ctx.account(vault)?.data.is_empty() {
        return Err(StateError::AccountInUse(*vault).into());
    }
    Ok(bump)
}

/// Accounts: owner (signer, writable), vault (writable), system program.
fn process_deposit(ctx: &mut InstructionContext<'_>, lamports: u64) -> Result<()> {
    let [owner, vault, _] = ctx.account_metas::<3>()?;
    ctx.require_signer(&owner.address)?;
    if lamports == 0 {
        return Err(PreconditionError::ZeroAmount.into());
    }
    verify_vault(ctx, &owner.address, &vault.address)?;

    ctx.invoke(&system::transfer(&owner.address, &vault.address, lamports))?;
    ctx.log(format!("vault {} received {} lamports", vault.address, lamports));
    Ok(())
}

/// Accounts: owner (signer, writable), vault (writable), system program.
fn process_withdraw(ctx: &mut InstructionContext<'_>) -> Result<()> {
    let [owner, vault, _] = ctx.account_metas::<3>()?;
    ctx.require_signer(&owner.address)?;
    let bump = verify_vault(ctx, &owner.address, &vault.address)?;

    let lamports = ctx.account(&vault.address)?.lamports;
    if lamports == 0 {
        return Err(StateError::VaultEmpty(vault.address).into());
    }
    ctx.invoke_signed(
        &system::transfer(&vault.address, &owner.address, lamports),
        &[&[VAULT_PREFIX, owner.address.as_ref(), &[bump]]],
    )?;
    ctx.log(format!(
        "vault {} returned {} lamports to {}",
        vault.address, lamports, owner.address
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::identity::Keypair;
    use crate::runtime::{execute, AccountStore, ProgramRegistry};

    fn setup() -> (AccountStore, Address, Address) {
        let owner = Keypair::from_seed(&[31u8; 32]).address();
        let (vault, _) = find_vault_address(&owner).unwrap();
        let mut store = AccountStore::new();
        store.insert(owner, Account::new(1_000_000, 0, &system::ID));
        store.insert(vault, Account::default());
        (store, owner, vault)
    }

    fn run(store: &mut AccountStore, ix: &Instruction) -> Result<()> {
        execute(store, &ProgramRegistry::with_builtins(), &mut Vec::new(), ix, 0)
    }

    #[test]
    fn deposit_then_withdraw() {
        let (mut store, owner, vault) = setup();
        run(&mut store, &deposit(&owner, 400_000).unwrap()).unwrap();
        run(&mut store, &deposit(&owner, 100_000).unwrap()).unwrap();
        assert_eq!(store[&vault].lamports, 500_000);
        assert_eq!(store[&vault].owner, system::ID);
        assert_eq!(store[&owner].lamports, 500_000);

        run(&mut store, &withdraw(&owner).unwrap()).unwrap();
        assert_eq!(store[&vault].lamports, 0);
        assert_eq!(store[&owner].lamports, 1_000_000);

        assert_eq!(
            run(&mut store, &withdraw(&owner).unwrap()),
            Err(StateError::VaultEmpty(vault).into())
        );
    }

    #[test]
    fn deposit_guards() {
        let (mut store, owner, vault) = setup();
        assert_eq!(
            run(&mut store, &deposit(&owner, 0).unwrap()),
            Err(PreconditionError::ZeroAmount.into())
        );

        let mut unsigned = deposit(&owner, 10).unwrap();
        unsigned.accounts[0].is_signer = false;
        assert_eq!(
            run(&mut store, &unsigned),
            Err(PreconditionError::MissingSigner(owner).into())
        );
        assert_eq!(store[&vault].lamports, 0);
    }

    #[test]
    fn only_owner_can_withdraw() {
        let (mut store, owner, vault) = setup();
        run(&mut store, &deposit(&owner, 10_000).unwrap()).unwrap();

        let thief = Keypair::from_seed(&[32u8; 32]).address();
        let (thief_vault, _) = find_vault_address(&thief).unwrap();
        store.insert(thief, Account::new(1, 0, &system::ID));

        // thief's signature over the owner's vault does not re-derive
        let mut ix = withdraw(&thief).unwrap();
        ix.accounts[1].address = vault;
        assert_eq!(
            run(&mut store, &ix),
            Err(MismatchError::Address {
                expected: thief_vault,
                actual: vault,
            }
            .into())
        );

        // the owner's vault without the owner's signature
        let mut ix = withdraw(&owner).unwrap();
        ix.accounts[0].is_signer = false;
        assert_eq!(
            run(&mut store, &ix),
            Err(PreconditionError::MissingSigner(owner).into())
        );
        assert_eq!(store[&vault].lamports, 10_000);
    }
}
