//! Guarded counter: a non-negative integer only its authority may move.

use bincode::{Decode, Encode};

use crate::account::{AccountMeta, AccountState, Instruction, DISCRIMINATOR_LEN};
use crate::error::{ArithmeticError, AuthorizationError, PreconditionError, StateError};
use crate::identity::Address;
use crate::programs::system;
use crate::runtime::{InstructionContext, Program};
use crate::Result;

pub const ID: Address = Address::from_name(b"counter");

pub const INITIALIZE: u8 = 0;
pub const INCREMENT: u8 = 1;
pub const DECREMENT: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CounterRecord {
    pub authority: Address,
    pub count: u64,
}

impl AccountState for CounterRecord {
    const NAME: &'static str = "CounterRecord";
    const SPACE: usize = DISCRIMINATOR_LEN + 32 + 8;
}

/// Creates the record at `counter`, which must co-sign.
pub fn initialize(user: &Address, counter: &Address) -> Instruction {
    Instruction::new_with_tag(
        ID,
        INITIALIZE,
        &(),
        vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(*counter, true),
            AccountMeta::new_readonly(system::ID, false),
        ],
    )
}

pub fn increment(authority: &Address, counter: &Address) -> Instruction {
    Instruction::new_with_tag(ID, INCREMENT, &(), guarded_accounts(authority, counter))
}

pub fn decrement(authority: &Address, counter: &Address) -> Instruction {
    Instruction::new_with_tag(ID, DECREMENT, &(), guarded_accounts(authority, counter))
}

fn guarded_accounts(authority: &Address, counter: &Address) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(*counter, false),
    ]
}

pub struct CounterProgram;

impl Program for CounterProgram {
    fn id(&self) -> Address {
        ID
    }

    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
        match data.first().copied() {
            Some(INITIALIZE) => process_initialize(ctx),
            Some(INCREMENT) => update(ctx, |count| {
                count.checked_add(1).ok_or(ArithmeticError::Overflow)
            }),
            Some(DECREMENT) => update(ctx, |count| {
                count.checked_sub(1).ok_or(ArithmeticError::CountBelowZero)
            }),
            _ => Err(PreconditionError::InvalidInstructionData.into()),
        }
    }
}

/// Accounts: user (signer, writable), counter (signer, writable), system program.
fn process_initialize(ctx: &mut InstructionContext<'_>) -> Result<()> {
    let [user, counter, _] = ctx.account_metas::<3>()?;
    ctx.require_signer(&user.address)?;

    system::create_account_in(
        ctx,
        &user.address,
        &counter.address,
        CounterRecord::SPACE,
        &ID,
        &[],
    )?;
    ctx.store(
        &counter.address,
        &CounterRecord {
            authority: user.address,
            count: 0,
        },
    )?;

    ctx.log(format!("counter {} initialized", counter.address));
    Ok(())
}

/// Accounts: authority (signer), counter (writable).
fn update(
    ctx: &mut InstructionContext<'_>,
    step: impl FnOnce(u64) -> std::result::Result<u64, ArithmeticError>,
) -> Result<()> {
    let [authority, counter] = ctx.account_metas::<2>()?;
    ctx.require_signer(&authority.address)?;

    let account = ctx.account(&counter.address)?;
    if account.data.is_empty() && account.is_owned_by(&system::ID) {
        return Err(StateError::NotInitialized(counter.address).into());
    }
    let mut record: CounterRecord = ctx.load(&counter.address, &ID)?;
    if record.authority != authority.address {
        return Err(AuthorizationError::AuthorityMismatch {
            expected: record.authority,
            actual: authority.address,
        }
        .into());
    }

    record.count = step(record.count)?;
    ctx.store(&counter.address, &record)?;
    ctx.log(format!("counter {} is now {}", counter.address, record.count));
    Ok(())
}
