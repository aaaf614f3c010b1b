//! In-process ledger: the sequencer that orders, authenticates and atomically
//! commits transactions.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bincode::{Decode, Encode};
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, debug_span};

use crate::account::{layout, Account, Instruction, Rent};
use crate::error::TransactionError;
use crate::identity::{Address, Hash, Keypair, Signature};
use crate::runtime::{self, AccountStore, ProgramRegistry};

/// Number of recent blockhashes a transaction may reference.
pub const MAX_RECENT_BLOCKHASHES: usize = 150;

/// The signed part of a transaction.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Message {
    pub recent_blockhash: Hash,
    pub instructions: Vec<Instruction>,
}

impl Message {
    /// Bytes every signer signs.
    pub fn serialize(&self) -> Vec<u8> {
        bincode::encode_to_vec(self, layout()).unwrap_or_default()
    }
}

/// A message plus one signature per signer.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub message: Message,
    pub signatures: Vec<(Address, Signature)>,
}

impl Transaction {
    /// Signs `instructions` with every keypair in `signers`; the first signer's
    /// signature identifies the transaction.
    pub fn new_signed(
        instructions: Vec<Instruction>,
        signers: &[&Keypair],
        recent_blockhash: Hash,
    ) -> Self {
        let message = Message {
            recent_blockhash,
            instructions,
        };
        let bytes = message.serialize();
        let signatures = signers
            .iter()
            .map(|kp| (kp.address(), kp.sign(&bytes)))
            .collect();
        Self {
            message,
            signatures,
        }
    }

    pub fn id(&self) -> Option<Signature> {
        self.signatures.first().map(|(_, sig)| *sig)
    }
}

/// Outcome of a committed transaction.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub signature: Signature,
    pub slot: u64,
    pub logs: Vec<String>,
}

/// Accounts plus the sequencing state needed to accept new transactions.
pub struct Ledger {
    accounts: AccountStore,
    registry: ProgramRegistry,
    slot: u64,
    recent_blockhashes: VecDeque<Hash>,
    processed: BTreeMap<Signature, u64>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Fresh ledger with the built-in programs.
    pub fn new() -> Self {
        Self::with_registry(ProgramRegistry::with_builtins())
    }

    pub fn with_registry(registry: ProgramRegistry) -> Self {
        let genesis = Hash::new_from_array(Sha256::digest(b"trustswap genesis").into());
        Self {
            accounts: AccountStore::new(),
            registry,
            slot: 0,
            recent_blockhashes: VecDeque::from([genesis]),
            processed: BTreeMap::new(),
        }
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }

    pub fn rent(&self) -> Rent {
        Rent::default()
    }

    pub fn latest_blockhash(&self) -> Hash {
        self.recent_blockhashes.back().copied().unwrap_or_default()
    }

    /// The account at `address`, if it holds anything.
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.lamports)
    }

    /// Overwrites an account directly, bypassing every program rule.
    pub fn set_account(&mut self, address: Address, account: Account) {
        if account.lamports == 0 {
            self.accounts.remove(&address);
        } else {
            self.accounts.insert(address, account);
        }
    }

    /// Credits native lamports out of thin air; returns the new balance.
    pub fn airdrop(&mut self, address: &Address, lamports: u64) -> u64 {
        let account = self.accounts.entry(*address).or_default();
        account.lamports = account.lamports.saturating_add(lamports);
        debug!(%address, lamports, balance = account.lamports, "airdrop");
        account.lamports
    }

    /// Authenticates `tx`, runs its instructions in order against a working
    /// copy of the referenced accounts and commits them only if all succeed.
    pub fn process_transaction(
        &mut self,
        tx: &Transaction,
    ) -> Result<TransactionReceipt, TransactionError> {
        let id = tx.id().ok_or(TransactionError::Unsigned)?;
        let _span = debug_span!("transaction", %id, slot = self.slot).entered();

        if tx.message.instructions.is_empty() {
            return Err(TransactionError::Empty);
        }
        let blockhash = tx.message.recent_blockhash;
        if !self.recent_blockhashes.contains(&blockhash) {
            return Err(TransactionError::BlockhashNotFound(blockhash));
        }
        if self.processed.contains_key(&id) {
            return Err(TransactionError::AlreadyProcessed(id));
        }

        let message = tx.message.serialize();
        let mut signers = BTreeSet::new();
        for (signer, signature) in &tx.signatures {
            if !signature.verify(signer, &message) {
                return Err(TransactionError::SignatureFailure(*signer));
            }
            signers.insert(*signer);
        }
        for meta in tx.message.instructions.iter().flat_map(|ix| &ix.accounts) {
            if meta.is_signer && !signers.contains(&meta.address) {
                return Err(TransactionError::MissingSignature(meta.address));
            }
        }

        let mut working = AccountStore::new();
        for meta in tx.message.instructions.iter().flat_map(|ix| &ix.accounts) {
            working
                .entry(meta.address)
                .or_insert_with(|| self.accounts.get(&meta.address).cloned().unwrap_or_default());
        }

        let mut logs = Vec::new();
        for (index, ix) in tx.message.instructions.iter().enumerate() {
            if let Err(error) = runtime::execute(&mut working, &self.registry, &mut logs, ix, 0) {
                debug!(index, %error, "transaction aborted");
                return Err(TransactionError::InstructionError { index, error });
            }
        }

        for (address, account) in working {
            self.set_account(address, account);
        }
        self.processed.insert(id, self.slot);
        let receipt = TransactionReceipt {
            signature: id,
            slot: self.slot,
            logs,
        };
        debug!(instructions = tx.message.instructions.len(), "transaction committed");
        self.advance();
        Ok(receipt)
    }

    /// Closes the current slot and issues a new blockhash.
    fn advance(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.latest_blockhash().to_bytes());
        hasher.update(self.slot.to_le_bytes());
        self.slot += 1;
        self.recent_blockhashes
            .push_back(Hash::new_from_array(hasher.finalize().into()));
        while self.recent_blockhashes.len() > MAX_RECENT_BLOCKHASHES {
            self.recent_blockhashes.pop_front();
        }

        // a replay past this horizon already fails on its expired blockhash
        let horizon = self.slot.saturating_sub(MAX_RECENT_BLOCKHASHES as u64);
        self.processed.retain(|_, slot| *slot >= horizon);
    }
}

/// Serializable image of a [`Ledger`], without its program registry.
#[cfg(feature = "json")]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub slot: u64,
    pub recent_blockhashes: Vec<Hash>,
    pub processed: Vec<(Signature, u64)>,
    pub accounts: BTreeMap<Address, Account>,
}

#[cfg(feature = "json")]
impl Ledger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            slot: self.slot,
            recent_blockhashes: self.recent_blockhashes.iter().copied().collect(),
            processed: self.processed.iter().map(|(s, slot)| (*s, *slot)).collect(),
            accounts: self.accounts.clone(),
        }
    }

    /// Restores a snapshot on top of the built-in programs.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let mut ledger = Self::new();
        ledger.slot = snapshot.slot;
        if !snapshot.recent_blockhashes.is_empty() {
            ledger.recent_blockhashes = snapshot.recent_blockhashes.into();
        }
        ledger.processed = snapshot.processed.into_iter().collect();
        ledger.accounts = snapshot.accounts;
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PreconditionError};
    use crate::programs::system;

    fn funded(ledger: &mut Ledger, seed: u8) -> Keypair {
        let kp = Keypair::from_seed(&[seed; 32]);
        ledger.airdrop(&kp.address(), 10_000_000);
        kp
    }

    #[test]
    fn transfer_commits_and_advances() {
        let mut ledger = Ledger::new();
        let alice = funded(&mut ledger, 1);
        let bob = Address::new_from_array([2u8; 32]);
        let before = ledger.latest_blockhash();

        let tx = Transaction::new_signed(
            vec![system::transfer(&alice.address(), &bob, 1_000)],
            &[&alice],
            before,
        );
        let receipt = ledger.process_transaction(&tx).unwrap();

        assert_eq!(receipt.slot, 0);
        assert_eq!(ledger.slot(), 1);
        assert_ne!(ledger.latest_blockhash(), before);
        assert_eq!(ledger.balance(&bob), 1_000);
        assert_eq!(ledger.balance(&alice.address()), 9_999_000);
        assert_eq!(
            ledger.process_transaction(&tx),
            Err(TransactionError::AlreadyProcessed(receipt.signature))
        );
    }

    #[test]
    fn signatures_are_enforced() {
        let mut ledger = Ledger::new();
        let alice = funded(&mut ledger, 1);
        let mallory = funded(&mut ledger, 3);
        let bob = Address::new_from_array([2u8; 32]);

        let tx = Transaction::new_signed(
            vec![system::transfer(&alice.address(), &bob, 1)],
            &[&mallory],
            ledger.latest_blockhash(),
        );
        assert_eq!(
            ledger.process_transaction(&tx),
            Err(TransactionError::MissingSignature(alice.address()))
        );

        let mut forged = Transaction::new_signed(
            vec![system::transfer(&alice.address(), &bob, 1)],
            &[&alice],
            ledger.latest_blockhash(),
        );
        forged.message.instructions[0] = system::transfer(&alice.address(), &bob, 2);
        assert_eq!(
            ledger.process_transaction(&forged),
            Err(TransactionError::SignatureFailure(alice.address()))
        );
        assert_eq!(ledger.balance(&bob), 0);
    }

    #[test]
    fn failing_instruction_rolls_back_all() {
        let mut ledger = Ledger::new();
        let alice = funded(&mut ledger, 1);
        let bob = Address::new_from_array([2u8; 32]);

        let tx = Transaction::new_signed(
            vec![
                system::transfer(&alice.address(), &bob, 1_000),
                system::transfer(&alice.address(), &bob, u64::MAX),
            ],
            &[&alice],
            ledger.latest_blockhash(),
        );
        let err = ledger.process_transaction(&tx).unwrap_err();
        assert_eq!(err.program_error().map(|e| e.kind()), Some(ErrorKind::PreconditionViolation));
        assert!(matches!(
            err,
            TransactionError::InstructionError {
                index: 1,
                error: crate::error::ProgramError::Precondition(
                    PreconditionError::InsufficientLamports { .. }
                ),
            }
        ));
        assert_eq!(ledger.balance(&bob), 0);
        assert_eq!(ledger.balance(&alice.address()), 10_000_000);
        assert_eq!(ledger.slot(), 0);
    }

    #[test]
    fn stale_blockhash_rejected() {
        let mut ledger = Ledger::new();
        let alice = funded(&mut ledger, 1);
        let stale = ledger.latest_blockhash();

        for i in 0..MAX_RECENT_BLOCKHASHES as u64 {
            let tx = Transaction::new_signed(
                vec![system::transfer(&alice.address(), &alice.address(), i)],
                &[&alice],
                ledger.latest_blockhash(),
            );
            ledger.process_transaction(&tx).unwrap();
        }

        let tx = Transaction::new_signed(
            vec![system::transfer(&alice.address(), &alice.address(), 0)],
            &[&alice],
            stale,
        );
        assert_eq!(
            ledger.process_transaction(&tx),
            Err(TransactionError::BlockhashNotFound(stale))
        );
    }

    #[test]
    fn empty_and_unsigned_rejected() {
        let mut ledger = Ledger::new();
        let alice = funded(&mut ledger, 1);
        let empty = Transaction::new_signed(vec![], &[&alice], ledger.latest_blockhash());
        assert_eq!(ledger.process_transaction(&empty), Err(TransactionError::Empty));

        let unsigned = Transaction::new_signed(
            vec![system::transfer(&alice.address(), &alice.address(), 1)],
            &[],
            ledger.latest_blockhash(),
        );
        assert_eq!(
            ledger.process_transaction(&unsigned),
            Err(TransactionError::Unsigned)
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn snapshot_restores_state() {
        let mut ledger = Ledger::new();
        let alice = funded(&mut ledger, 1);
        let tx = Transaction::new_signed(
            vec![system::transfer(&alice.address(), &Address::new_from_array([2u8; 32]), 5)],
            &[&alice],
            ledger.latest_blockhash(),
        );
        ledger.process_transaction(&tx).unwrap();

        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let mut restored = Ledger::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert!(matches!(
            restored.process_transaction(&tx),
            Err(TransactionError::AlreadyProcessed(_))
        ));
    }
}
