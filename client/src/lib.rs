use error::{ClientError, Result};
use tracing::{debug, info, instrument};
use trustswap_core::account::AccountState;
use trustswap_core::counter::{self, CounterRecord};
use trustswap_core::error::MismatchError;
use trustswap_core::escrow::instruction::{self as escrow_ix, MakeArgs};
use trustswap_core::escrow::{self, escrow_address, EscrowRecord};
use trustswap_core::interface::EscrowMetadata;
use trustswap_core::pda::associated_token_address;
use trustswap_core::programs::token::{self, Mint, TokenAccount};
use trustswap_core::programs::{associated_token, system};
use trustswap_core::vault;
use trustswap_core::{
    Account, Address, Instruction, Keypair, Ledger, ProgramError, Transaction, TransactionReceipt,
};

pub mod config;
pub mod error;
pub mod util;

/// Drives the escrow and counter programs on a ledger, signing as `payer`.
///
/// Every operation builds, signs and submits exactly one transaction; a
/// rejected transaction leaves the ledger untouched.
pub struct SwapClient {
    ledger: Ledger,
    payer: Keypair,
}

impl SwapClient {
    pub fn new(ledger: Ledger, payer: Keypair) -> Self {
        debug!(payer = %payer.address(), "Using payer");
        Self { ledger, payer }
    }

    pub fn payer(&self) -> Address {
        self.payer.address()
    }

    /// Switches the signing identity, returning the previous one.
    pub fn set_payer(&mut self, payer: Keypair) -> Keypair {
        std::mem::replace(&mut self.payer, payer)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    fn send(&mut self, ixs: Vec<Instruction>, extra: &[&Keypair]) -> Result<TransactionReceipt> {
        let mut signers = vec![&self.payer];
        signers.extend_from_slice(extra);

        let blockhash = self.ledger.latest_blockhash();
        debug!(%blockhash, instructions = ixs.len(), "Submitting transaction");
        let tx = Transaction::new_signed(ixs, &signers, blockhash);
        let receipt = self.ledger.process_transaction(&tx)?;
        for line in &receipt.logs {
            debug!("{}", line);
        }
        info!(signature = %receipt.signature, slot = receipt.slot, "Transaction committed");
        Ok(receipt)
    }

    #[instrument(skip(self))]
    pub fn airdrop(&mut self, to: &Address, lamports: u64) -> u64 {
        self.ledger.airdrop(to, lamports)
    }

    pub fn lamports(&self, address: &Address) -> u64 {
        self.ledger.balance(address)
    }

    /// Creates a mint at `mint`'s address with the payer as mint authority.
    #[instrument(skip(self, mint), fields(mint = %mint.address()))]
    pub fn create_mint(&mut self, mint: &Keypair, decimals: u8) -> Result<Address> {
        let space = Mint::SPACE;
        let lamports = self.ledger.rent().minimum_balance(space);
        let ixs = vec![
            system::create_account(
                &self.payer(),
                &mint.address(),
                lamports,
                space as u64,
                &token::ID,
            ),
            token::initialize_mint(&mint.address(), &self.payer(), decimals),
        ];
        self.send(ixs, &[mint])?;
        Ok(mint.address())
    }

    /// Associated token account of `wallet` for `mint`, created on demand.
    #[instrument(skip(self))]
    pub fn token_account(&mut self, wallet: &Address, mint: &Address) -> Result<Address> {
        let address = ata(wallet, mint)?;
        if self.ledger.account(&address).is_none() {
            let ix = associated_token::create(&self.payer(), wallet, mint)?;
            self.send(vec![ix], &[])?;
        }
        Ok(address)
    }

    /// Mints `amount` units to `wallet`; the payer must be the mint authority.
    #[instrument(skip(self))]
    pub fn mint_to(
        &mut self,
        mint: &Address,
        wallet: &Address,
        amount: u64,
    ) -> Result<TransactionReceipt> {
        let payer = self.payer();
        let ixs = vec![
            associated_token::create_idempotent(&payer, wallet, mint)?,
            token::mint_to(mint, &ata(wallet, mint)?, &payer, amount),
        ];
        self.send(ixs, &[])
    }

    /// Units of `mint` held in `wallet`'s associated account, zero if it has none.
    pub fn token_balance(&self, wallet: &Address, mint: &Address) -> Result<u64> {
        let address = ata(wallet, mint)?;
        match self.ledger.account(&address) {
            Some(account) => Ok(TokenAccount::unpack(&address, &account.data)?.amount),
            None => Ok(0),
        }
    }

    /// Opens an offer as the payer and returns what is needed to settle it.
    #[instrument(skip(self))]
    pub fn make(
        &mut self,
        mint_offered: &Address,
        mint_requested: &Address,
        seed: u64,
        amount_offered: u64,
        amount_requested: u64,
    ) -> Result<EscrowMetadata> {
        let maker = self.payer();
        let escrow = escrow_address(&maker, seed)?;
        info!(%escrow, "Derived escrow record");

        let ix = escrow_ix::make(
            &maker,
            mint_offered,
            mint_requested,
            MakeArgs {
                seed,
                amount_requested,
                amount_offered,
            },
        )?;
        self.send(vec![ix], &[])?;

        let record = self.escrow(&escrow)?;
        Ok(EscrowMetadata::open(escrow, &record, amount_offered)?)
    }

    /// Fills the offer at `escrow` as the payer.
    #[instrument(skip(self))]
    pub fn take(&mut self, escrow: &Address) -> Result<TransactionReceipt> {
        let record = self.escrow(escrow)?;
        let ix = escrow_ix::take(
            &self.payer(),
            &record.maker,
            escrow,
            &record.mint_offered,
            &record.mint_requested,
        )?;
        self.send(vec![ix], &[])
    }

    /// Cancels the offer at `escrow`; the payer must be its maker.
    #[instrument(skip(self))]
    pub fn refund(&mut self, escrow: &Address) -> Result<TransactionReceipt> {
        let record = self.escrow(escrow)?;
        let ix = escrow_ix::refund(&self.payer(), escrow, &record.mint_offered)?;
        self.send(vec![ix], &[])
    }

    /// Reads the open offer at `escrow`; only records the escrow program
    /// owns are trusted.
    pub fn escrow(&self, escrow: &Address) -> Result<EscrowRecord> {
        let account = self
            .ledger
            .account(escrow)
            .filter(|a| !a.data.is_empty())
            .ok_or(ClientError::EscrowNotFound(*escrow))?;
        require_owner(escrow, account, &escrow::ID)?;
        Ok(EscrowRecord::unpack(escrow, &account.data)?)
    }

    /// Creates a counter at `counter`'s address with the payer as authority.
    #[instrument(skip(self, counter), fields(counter = %counter.address()))]
    pub fn counter_init(&mut self, counter: &Keypair) -> Result<TransactionReceipt> {
        let ix = counter::initialize(&self.payer(), &counter.address());
        self.send(vec![ix], &[counter])
    }

    #[instrument(skip(self))]
    pub fn increment(&mut self, counter: &Address) -> Result<u64> {
        let ix = counter::increment(&self.payer(), counter);
        self.send(vec![ix], &[])?;
        Ok(self.counter(counter)?.count)
    }

    #[instrument(skip(self))]
    pub fn decrement(&mut self, counter: &Address) -> Result<u64> {
        let ix = counter::decrement(&self.payer(), counter);
        self.send(vec![ix], &[])?;
        Ok(self.counter(counter)?.count)
    }

    /// Parks `lamports` in the payer's vault; returns the vault balance.
    #[instrument(skip(self))]
    pub fn deposit(&mut self, lamports: u64) -> Result<u64> {
        let ix = vault::deposit(&self.payer(), lamports)?;
        self.send(vec![ix], &[])?;
        self.vault_balance(&self.payer())
    }

    /// Empties the payer's vault; returns the lamports withdrawn.
    #[instrument(skip(self))]
    pub fn withdraw(&mut self) -> Result<u64> {
        let held = self.vault_balance(&self.payer())?;
        let ix = vault::withdraw(&self.payer())?;
        self.send(vec![ix], &[])?;
        Ok(held)
    }

    /// Lamports held in the vault of `owner`.
    pub fn vault_balance(&self, owner: &Address) -> Result<u64> {
        let (address, _) = vault::find_vault_address(owner)?;
        Ok(self.ledger.balance(&address))
    }

    pub fn counter(&self, counter: &Address) -> Result<CounterRecord> {
        let account = self
            .ledger
            .account(counter)
            .filter(|a| !a.data.is_empty())
            .ok_or(ClientError::CounterNotFound(*counter))?;
        require_owner(counter, account, &counter::ID)?;
        Ok(CounterRecord::unpack(counter, &account.data)?)
    }
}

fn ata(wallet: &Address, mint: &Address) -> Result<Address> {
    Ok(associated_token_address(wallet, mint)?.0)
}

/// Same owner rule the runtime applies before a program reads its state.
fn require_owner(address: &Address, account: &Account, owner: &Address) -> Result<()> {
    if account.is_owned_by(owner) {
        return Ok(());
    }
    Err(ProgramError::from(MismatchError::Owner {
        address: *address,
        expected: *owner,
        actual: account.owner,
    })
    .into())
}

#[cfg(test)]
mod tests {
    use trustswap_core::error::{ArithmeticError, AuthorizationError, StateError};
    use trustswap_core::escrow::EscrowState;
    use trustswap_core::{ErrorKind, ProgramError, TransactionError};

    use super::*;

    fn program_error(err: ClientError) -> ProgramError {
        match err {
            ClientError::Transaction(TransactionError::InstructionError { error, .. }) => error,
            other => panic!("Expected instruction error, got {:?}", other),
        }
    }

    /// Client signing as the maker, with a funded taker keypair on the side.
    fn setup() -> (SwapClient, Keypair, Address, Address) {
        let maker = Keypair::from_seed(&[1u8; 32]);
        let taker = Keypair::from_seed(&[2u8; 32]);
        let mut client = SwapClient::new(Ledger::new(), maker);
        client.airdrop(&client.payer(), 1_000_000_000);
        client.airdrop(&taker.address(), 1_000_000_000);

        let mint_a = client
            .create_mint(&Keypair::from_seed(&[3u8; 32]), 6)
            .unwrap();
        let mint_b = client
            .create_mint(&Keypair::from_seed(&[4u8; 32]), 9)
            .unwrap();
        client.mint_to(&mint_a, &client.payer(), 100).unwrap();
        client.mint_to(&mint_b, &taker.address(), 50).unwrap();
        (client, taker, mint_a, mint_b)
    }

    #[test]
    fn make_take_through_client() {
        let (mut client, taker, mint_a, mint_b) = setup();
        let maker = client.payer();

        let meta = client.make(&mint_a, &mint_b, 7, 100, 50).unwrap();
        assert_eq!(meta.state, EscrowState::Open);
        assert_eq!(meta.maker, maker);
        assert_eq!(client.token_balance(&meta.escrow, &mint_a).unwrap(), 100);

        let maker_kp = client.set_payer(taker);
        client.take(&meta.escrow).unwrap();
        let taker = client.payer();

        assert_eq!(client.token_balance(&taker, &mint_a).unwrap(), 100);
        assert_eq!(client.token_balance(&maker, &mint_b).unwrap(), 50);
        assert!(matches!(
            client.escrow(&meta.escrow),
            Err(ClientError::EscrowNotFound(_))
        ));

        client.set_payer(maker_kp);
        assert!(matches!(
            client.refund(&meta.escrow),
            Err(ClientError::EscrowNotFound(_))
        ));
    }

    #[test]
    fn refund_through_client() {
        let (mut client, taker, mint_a, mint_b) = setup();
        let meta = client.make(&mint_a, &mint_b, 1, 40, 10).unwrap();
        assert_eq!(client.token_balance(&client.payer(), &mint_a).unwrap(), 60);

        let maker_kp = client.set_payer(taker);
        let err = program_error(client.refund(&meta.escrow).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
        assert!(matches!(
            err,
            ProgramError::Authorization(AuthorizationError::NotMaker { .. })
        ));

        client.set_payer(maker_kp);
        client.refund(&meta.escrow).unwrap();
        assert_eq!(client.token_balance(&client.payer(), &mint_a).unwrap(), 100);

        let err = program_error(client.make(&mint_a, &mint_b, 1, 0, 10).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    }

    #[test]
    fn vault_through_client() {
        let mut client = SwapClient::new(Ledger::new(), Keypair::from_seed(&[8u8; 32]));
        let owner = client.payer();
        client.airdrop(&owner, 1_000_000);

        assert_eq!(client.deposit(300_000).unwrap(), 300_000);
        assert_eq!(client.deposit(200_000).unwrap(), 500_000);
        assert_eq!(client.lamports(&owner), 500_000);

        let owner_kp = client.set_payer(Keypair::from_seed(&[9u8; 32]));
        let (other_vault, _) = vault::find_vault_address(&client.payer()).unwrap();
        assert_eq!(client.vault_balance(&owner).unwrap(), 500_000);
        assert_eq!(
            program_error(client.withdraw().unwrap_err()),
            StateError::VaultEmpty(other_vault).into()
        );

        client.set_payer(owner_kp);
        assert_eq!(client.withdraw().unwrap(), 500_000);
        assert_eq!(client.lamports(&owner), 1_000_000);
        assert_eq!(client.vault_balance(&owner).unwrap(), 0);
    }

    #[test]
    fn foreign_records_are_not_trusted() {
        let mut ledger = Ledger::new();
        let forger = Address::from_name(b"forger");
        let forged = Address::new_from_array([42u8; 32]);
        let record = EscrowRecord {
            seed: 1,
            maker: forged,
            mint_offered: forged,
            mint_requested: forged,
            amount_requested: 1,
            bump: 255,
        };
        let mut account = Account::new(1_000_000, EscrowRecord::SPACE, &forger);
        record.pack_into(&mut account.data).unwrap();
        ledger.set_account(forged, account);

        let stray = Address::new_from_array([43u8; 32]);
        ledger.airdrop(&stray, 1);

        let client = SwapClient::new(ledger, Keypair::from_seed(&[7u8; 32]));
        match client.escrow(&forged) {
            Err(ClientError::AccountData(ProgramError::AccountMismatch(
                MismatchError::Owner { expected, actual, .. },
            ))) => {
                assert_eq!(expected, escrow::ID);
                assert_eq!(actual, forger);
            }
            other => panic!("Expected owner mismatch, got {:?}", other),
        }
        assert!(matches!(
            client.escrow(&stray),
            Err(ClientError::EscrowNotFound(_))
        ));
        assert!(matches!(
            client.counter(&forged),
            Err(ClientError::AccountData(_))
        ));
    }

    #[test]
    fn counter_through_client() {
        let mut client = SwapClient::new(Ledger::new(), Keypair::from_seed(&[5u8; 32]));
        client.airdrop(&client.payer(), 1_000_000_000);
        let counter = Keypair::from_seed(&[6u8; 32]);

        client.counter_init(&counter).unwrap();
        let addr = counter.address();
        assert_eq!(client.increment(&addr).unwrap(), 1);
        assert_eq!(client.increment(&addr).unwrap(), 2);
        assert_eq!(client.decrement(&addr).unwrap(), 1);
        assert_eq!(client.decrement(&addr).unwrap(), 0);
        assert_eq!(
            program_error(client.decrement(&addr).unwrap_err()),
            ArithmeticError::CountBelowZero.into()
        );
        assert_eq!(client.counter(&addr).unwrap().count, 0);

        assert_eq!(
            program_error(client.counter_init(&counter).unwrap_err()),
            StateError::AccountInUse(addr).into()
        );
    }
}
