//! Program execution: the per-instruction context handed to programs,
//! cross-program invocation, and the account-ownership rules checked after
//! every call.

use std::collections::BTreeMap;

use tracing::trace;

use crate::account::{Account, AccountMeta, AccountState, Instruction, Rent};
use crate::error::{
    ArithmeticError, AuthorizationError, MismatchError, PreconditionError, ProgramError,
};
use crate::identity::Address;
use crate::pda::create_program_address;
use crate::programs::{associated_token, system, token};
use crate::{counter, escrow, vault, Result};

/// Maximum nesting of cross-program calls below the top-level instruction.
pub const MAX_INVOKE_DEPTH: usize = 4;

/// Accounts visible to a running transaction.
pub type AccountStore = BTreeMap<Address, Account>;

/// A deterministic program the ledger can dispatch instructions to.
pub trait Program: Send + Sync {
    /// Address instructions are sent to.
    fn id(&self) -> Address;

    /// Executes one instruction against the accounts in `ctx`.
    fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()>;
}

/// Programs known to a ledger, keyed by id.
#[derive(Default)]
pub struct ProgramRegistry {
    programs: BTreeMap<Address, Box<dyn Program>>,
}

impl ProgramRegistry {
    /// Registry with the system, token, associated-token, escrow, counter and
    /// vault programs.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(system::SystemProgram));
        registry.register(Box::new(token::TokenProgram));
        registry.register(Box::new(associated_token::AssociatedTokenProgram));
        registry.register(Box::new(escrow::EscrowProgram));
        registry.register(Box::new(counter::CounterProgram));
        registry.register(Box::new(vault::VaultProgram));
        registry
    }

    pub fn register(&mut self, program: Box<dyn Program>) {
        self.programs.insert(program.id(), program);
    }

    pub fn get(&self, id: &Address) -> Option<&dyn Program> {
        self.programs.get(id).map(|p| p.as_ref())
    }

    pub fn contains(&self, id: &Address) -> bool {
        self.programs.contains_key(id)
    }
}

/// Runs `ix` against `store`, then checks the ownership rules for it.
pub(crate) fn execute(
    store: &mut AccountStore,
    registry: &ProgramRegistry,
    logs: &mut Vec<String>,
    ix: &Instruction,
    depth: usize,
) -> Result<()> {
    let program = registry
        .get(&ix.program_id)
        .ok_or(PreconditionError::UnknownProgram(ix.program_id))?;

    logs.push(format!("Program {} invoke [{}]", ix.program_id, depth + 1));
    let mut ctx = InstructionContext::new(ix, store, registry, logs, depth);
    let result = program
        .process(&mut ctx, &ix.data)
        .and_then(|()| ctx.verify());

    match &result {
        Ok(()) => logs.push(format!("Program {} success", ix.program_id)),
        Err(e) => logs.push(format!("Program {} failed: {}", ix.program_id, e)),
    }
    result
}

/// Everything one program invocation may see and touch.
pub struct InstructionContext<'a> {
    program_id: Address,
    metas: Vec<AccountMeta>,
    store: &'a mut AccountStore,
    registry: &'a ProgramRegistry,
    logs: &'a mut Vec<String>,
    depth: usize,
    pre: BTreeMap<Address, Account>,
}

impl<'a> InstructionContext<'a> {
    fn new(
        ix: &Instruction,
        store: &'a mut AccountStore,
        registry: &'a ProgramRegistry,
        logs: &'a mut Vec<String>,
        depth: usize,
    ) -> Self {
        let mut ctx = Self {
            program_id: ix.program_id,
            metas: ix.accounts.clone(),
            store,
            registry,
            logs,
            depth,
            pre: BTreeMap::new(),
        };
        ctx.snapshot();
        ctx
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    /// Account references in the order the caller supplied them.
    pub fn accounts(&self) -> &[AccountMeta] {
        &self.metas
    }

    /// The first `N` account references, or `NotEnoughAccounts`.
    pub fn account_metas<const N: usize>(&self) -> Result<[AccountMeta; N]> {
        self.metas
            .get(..N)
            .and_then(|metas| <[AccountMeta; N]>::try_from(metas).ok())
            .ok_or_else(|| {
                PreconditionError::NotEnoughAccounts {
                    expected: N,
                    actual: self.metas.len(),
                }
                .into()
            })
    }

    /// Signer if any reference to `address` is flagged as signer.
    pub fn is_signer(&self, address: &Address) -> bool {
        self.metas
            .iter()
            .any(|m| m.address == *address && m.is_signer)
    }

    pub fn is_writable(&self, address: &Address) -> bool {
        self.metas
            .iter()
            .any(|m| m.address == *address && m.is_writable)
    }

    fn is_declared(&self, address: &Address) -> bool {
        self.metas.iter().any(|m| m.address == *address)
    }

    pub fn rent(&self) -> Rent {
        Rent::default()
    }

    pub fn account(&self, address: &Address) -> Result<&Account> {
        if !self.is_declared(address) {
            return Err(PreconditionError::MissingAccount(*address).into());
        }
        self.store
            .get(address)
            .ok_or_else(|| PreconditionError::MissingAccount(*address).into())
    }

    pub fn account_mut(&mut self, address: &Address) -> Result<&mut Account> {
        if !self.is_declared(address) {
            return Err(PreconditionError::MissingAccount(*address).into());
        }
        if !self.is_writable(address) {
            return Err(PreconditionError::NotWritable(*address).into());
        }
        self.store
            .get_mut(address)
            .ok_or_else(|| PreconditionError::MissingAccount(*address).into())
    }

    pub fn require_signer(&self, address: &Address) -> Result<()> {
        if self.is_signer(address) {
            Ok(())
        } else {
            Err(PreconditionError::MissingSigner(*address).into())
        }
    }

    pub fn require_writable(&self, address: &Address) -> Result<()> {
        if self.is_writable(address) {
            Ok(())
        } else {
            Err(PreconditionError::NotWritable(*address).into())
        }
    }

    pub fn require_owner(&self, address: &Address, owner: &Address) -> Result<()> {
        let account = self.account(address)?;
        if account.is_owned_by(owner) {
            Ok(())
        } else {
            Err(MismatchError::Owner {
                address: *address,
                expected: *owner,
                actual: account.owner,
            }
            .into())
        }
    }

    /// Reads a record of type `T` from an account that `owner` must own.
    pub fn load<T: AccountState>(&self, address: &Address, owner: &Address) -> Result<T> {
        self.require_owner(address, owner)?;
        T::unpack(address, &self.account(address)?.data)
    }

    /// Writes `state` into an account owned by the running program.
    pub fn store<T: AccountState>(&mut self, address: &Address, state: &T) -> Result<()> {
        state.pack_into(&mut self.account_mut(address)?.data)
    }

    /// Moves every lamport of `address` to `destination`, wipes the data and
    /// hands the account back to the system program.
    pub fn close_account(&mut self, address: &Address, destination: &Address) -> Result<()> {
        let lamports = self.account(address)?.lamports;
        let dest = self.account_mut(destination)?;
        dest.lamports = dest
            .lamports
            .checked_add(lamports)
            .ok_or(ArithmeticError::Overflow)?;

        let account = self.account_mut(address)?;
        account.lamports = 0;
        account.data.clear();
        account.owner = system::ID;
        Ok(())
    }

    /// Records a program log line.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        trace!(program = %self.program_id, "{}", message);
        self.logs.push(format!("Program log: {}", message));
    }

    /// Calls another program with a subset of this instruction's accounts.
    pub fn invoke(&mut self, ix: &Instruction) -> Result<()> {
        self.invoke_signed(ix, &[])
    }

    /// Like [`Self::invoke`], additionally signing for every address derived
    /// from `signer_seeds` under this program's id.
    pub fn invoke_signed(&mut self, ix: &Instruction, signer_seeds: &[&[&[u8]]]) -> Result<()> {
        if self.depth + 1 > MAX_INVOKE_DEPTH {
            return Err(PreconditionError::CallDepthExceeded.into());
        }

        let derived = signer_seeds
            .iter()
            .map(|seeds| create_program_address(seeds, &self.program_id))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ProgramError::from)?;

        for meta in &ix.accounts {
            if !self.is_declared(&meta.address) {
                return Err(PreconditionError::MissingAccount(meta.address).into());
            }
            if meta.is_writable && !self.is_writable(&meta.address) {
                return Err(AuthorizationError::PrivilegeEscalation(meta.address).into());
            }
            if meta.is_signer
                && !self.is_signer(&meta.address)
                && !derived.contains(&meta.address)
            {
                return Err(AuthorizationError::PrivilegeEscalation(meta.address).into());
            }
        }

        self.verify()?;
        execute(
            &mut *self.store,
            self.registry,
            &mut *self.logs,
            ix,
            self.depth + 1,
        )?;
        self.snapshot();
        Ok(())
    }

    fn snapshot(&mut self) {
        self.pre = self
            .metas
            .iter()
            .map(|m| {
                let account = self.store.get(&m.address).cloned().unwrap_or_default();
                (m.address, account)
            })
            .collect();
    }

    /// Checks every change since the last snapshot against the ownership rules.
    fn verify(&self) -> Result<()> {
        let mut before: u128 = 0;
        let mut after: u128 = 0;

        for (address, pre) in &self.pre {
            let default = Account::default();
            let post = self.store.get(address).unwrap_or(&default);
            before += u128::from(pre.lamports);
            after += u128::from(post.lamports);

            if pre == post {
                continue;
            }
            if !self.is_writable(address) {
                return Err(AuthorizationError::ReadonlyModified(*address).into());
            }
            let owned = pre.owner == self.program_id;
            if post.owner != pre.owner && (!owned || post.data.iter().any(|b| *b != 0)) {
                return Err(AuthorizationError::IllegalOwnerChange(*address).into());
            }
            if !owned && (post.data != pre.data || post.lamports < pre.lamports) {
                return Err(AuthorizationError::ExternalAccountModified(*address).into());
            }
        }

        if before != after {
            return Err(ArithmeticError::UnbalancedInstruction.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Misbehaving program used to exercise the ownership rules.
    struct Rogue;

    const ROGUE: Address = Address::from_name(b"rogue");

    impl Program for Rogue {
        fn id(&self) -> Address {
            ROGUE
        }

        fn process(&self, ctx: &mut InstructionContext<'_>, data: &[u8]) -> Result<()> {
            let [target, other] = ctx.account_metas::<2>()?;
            match data.first() {
                // steal lamports from an account it does not own
                Some(0) => {
                    ctx.account_mut(&target.address)?.lamports -= 1;
                    ctx.account_mut(&other.address)?.lamports += 1;
                }
                // mint lamports out of nothing on an account it owns
                Some(1) => ctx.account_mut(&target.address)?.lamports += 1,
                // scribble on foreign data
                Some(2) => ctx.account_mut(&target.address)?.data.push(1),
                // ask the system program to sign for someone else
                Some(3) => {
                    let ix = system::transfer(&target.address, &other.address, 1);
                    ctx.invoke(&ix)?;
                }
                _ => {}
            }
            Ok(())
        }
    }

    fn setup() -> (AccountStore, ProgramRegistry, Address, Address) {
        let mut registry = ProgramRegistry::with_builtins();
        registry.register(Box::new(Rogue));

        let victim = Address::new_from_array([1u8; 32]);
        let thief = Address::new_from_array([2u8; 32]);
        let mut store = AccountStore::new();
        store.insert(victim, Account::new(100, 0, &system::ID));
        store.insert(thief, Account::new(100, 0, &ROGUE));
        (store, registry, victim, thief)
    }

    fn run(tag: u8, target: Address, other: Address) -> Result<()> {
        let (mut store, registry, _, _) = setup();
        let ix = Instruction {
            program_id: ROGUE,
            accounts: vec![
                AccountMeta::new(target, false),
                AccountMeta::new(other, false),
                AccountMeta::new_readonly(system::ID, false),
            ],
            data: vec![tag],
        };
        let mut logs = Vec::new();
        execute(&mut store, &registry, &mut logs, &ix, 0)
    }

    #[test]
    fn foreign_debit_rejected() {
        let (_, _, victim, thief) = setup();
        assert_eq!(
            run(0, victim, thief),
            Err(AuthorizationError::ExternalAccountModified(victim).into())
        );
    }

    #[test]
    fn lamport_creation_rejected() {
        let (_, _, victim, thief) = setup();
        assert_eq!(
            run(1, thief, victim),
            Err(ArithmeticError::UnbalancedInstruction.into())
        );
    }

    #[test]
    fn foreign_data_write_rejected() {
        let (_, _, victim, thief) = setup();
        assert_eq!(
            run(2, victim, thief),
            Err(AuthorizationError::ExternalAccountModified(victim).into())
        );
    }

    #[test]
    fn signer_escalation_rejected() {
        let (_, _, victim, thief) = setup();
        assert_eq!(
            run(3, victim, thief),
            Err(AuthorizationError::PrivilegeEscalation(victim).into())
        );
    }

    #[test]
    fn unknown_program_rejected() {
        let (mut store, registry, victim, _) = setup();
        let ix = Instruction {
            program_id: Address::from_name(b"nobody"),
            accounts: vec![AccountMeta::new(victim, false)],
            data: vec![],
        };
        let mut logs = Vec::new();
        assert_eq!(
            execute(&mut store, &registry, &mut logs, &ix, 0),
            Err(PreconditionError::UnknownProgram(Address::from_name(b"nobody")).into())
        );
    }

    #[test]
    fn readonly_account_cannot_be_written() {
        let (mut store, registry, victim, thief) = setup();
        let ix = Instruction {
            program_id: ROGUE,
            accounts: vec![
                AccountMeta::new_readonly(thief, false),
                AccountMeta::new(victim, false),
            ],
            data: vec![1],
        };
        let mut logs = Vec::new();
        assert_eq!(
            execute(&mut store, &registry, &mut logs, &ix, 0),
            Err(PreconditionError::NotWritable(thief).into())
        );
    }
}
