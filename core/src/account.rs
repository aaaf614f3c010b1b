//! Accounts, instructions and fixed-layout persisted state.

use bincode::config::{self, Configuration, Fixint, LittleEndian};
use bincode::{Decode, Encode};
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MismatchError, PreconditionError, ProgramError};
use crate::identity::Address;
use crate::programs::system;
use crate::Result;

/// Length of the type tag at the start of every persisted record.
pub const DISCRIMINATOR_LEN: usize = 8;

/// An addressable ledger account.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Native balance; also funds the storage deposit.
    pub lamports: u64,
    /// Program allowed to mutate `data` and debit `lamports`.
    pub owner: Address,
    #[cfg_attr(feature = "json", serde(with = "hex::serde"))]
    pub data: Vec<u8>,
    pub executable: bool,
}

impl Account {
    pub fn new(lamports: u64, space: usize, owner: &Address) -> Self {
        Self {
            lamports,
            owner: *owner,
            data: vec![0u8; space],
            executable: false,
        }
    }

    /// An empty account has no lamports and no data; closed and never-created
    /// accounts look the same.
    pub fn is_empty(&self) -> bool {
        self.lamports == 0 && self.data.is_empty()
    }

    pub fn is_owned_by(&self, program_id: &Address) -> bool {
        self.owner == *program_id
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new(0, 0, &system::ID)
    }
}

/// An account reference inside an instruction.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

/// A call into one program with explicit account references.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    #[cfg_attr(feature = "json", serde(with = "hex::serde"))]
    pub data: Vec<u8>,
}

impl Instruction {
    /// Builds an instruction whose data is the fixed-int encoding of `data`.
    pub fn new_with_bincode<T: Encode>(
        program_id: Address,
        data: &T,
        accounts: Vec<AccountMeta>,
    ) -> Self {
        Self {
            program_id,
            accounts,
            data: bincode::encode_to_vec(data, layout()).unwrap_or_default(),
        }
    }

    /// Builds an instruction whose data is `tag` followed by the encoded `args`.
    pub fn new_with_tag<T: Encode>(
        program_id: Address,
        tag: u8,
        args: &T,
        accounts: Vec<AccountMeta>,
    ) -> Self {
        let mut data = vec![tag];
        if let Ok(encoded) = bincode::encode_to_vec(args, layout()) {
            data.extend_from_slice(&encoded);
        }
        Self {
            program_id,
            accounts,
            data,
        }
    }
}

/// Decodes instruction arguments that follow the tag byte.
pub fn decode_args<T: Decode<()>>(data: &[u8]) -> Result<T> {
    bincode::decode_from_slice(data, layout())
        .map(|(args, _)| args)
        .map_err(|_| PreconditionError::InvalidInstructionData.into())
}

/// Fixed-width little-endian encoding used for every persisted layout.
pub fn layout() -> Configuration<LittleEndian, Fixint> {
    config::standard().with_fixed_int_encoding()
}

/// Storage deposit schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rent {
    pub lamports_per_byte_year: u64,
    pub exemption_years: u64,
}

impl Rent {
    /// Bytes charged for every account on top of its data.
    pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

    /// Deposit that keeps an account of `space` bytes alive indefinitely.
    pub fn minimum_balance(&self, space: usize) -> u64 {
        (Self::ACCOUNT_STORAGE_OVERHEAD + space as u64)
            * self.lamports_per_byte_year
            * self.exemption_years
    }
}

impl Default for Rent {
    fn default() -> Self {
        Self {
            lamports_per_byte_year: 3_480,
            exemption_years: 2,
        }
    }
}

/// A fixed-layout record persisted in an account's data.
///
/// Layout: 8-byte discriminator, then the fixed-int encoding of `Self`,
/// zero-padded to [`AccountState::SPACE`].
pub trait AccountState: Encode + Decode<()> + Sized {
    /// Type name hashed into the discriminator.
    const NAME: &'static str;

    /// Total bytes the record occupies, discriminator included.
    const SPACE: usize;

    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        let digest = Sha256::digest(format!("account:{}", Self::NAME).as_bytes());
        let mut disc = [0u8; DISCRIMINATOR_LEN];
        disc.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
        disc
    }

    /// Writes `self` into `data`, which must be at least `SPACE` long.
    fn pack_into(&self, data: &mut [u8]) -> Result<()> {
        if data.len() < Self::SPACE {
            return Err(PreconditionError::AccountDataTooSmall {
                needed: Self::SPACE,
                actual: data.len(),
            }
            .into());
        }
        let body = bincode::encode_to_vec(self, layout())
            .map_err(|_| ProgramError::from(PreconditionError::InvalidInstructionData))?;
        let end = DISCRIMINATOR_LEN + body.len();
        if end > data.len() {
            return Err(PreconditionError::AccountDataTooSmall {
                needed: end,
                actual: data.len(),
            }
            .into());
        }
        data.fill(0);
        data[..DISCRIMINATOR_LEN].copy_from_slice(&Self::discriminator());
        data[DISCRIMINATOR_LEN..end].copy_from_slice(&body);
        Ok(())
    }

    /// Reads a record of this type from `data` held at `address`.
    fn unpack(address: &Address, data: &[u8]) -> Result<Self> {
        if data.len() < Self::SPACE || data[..DISCRIMINATOR_LEN] != Self::discriminator() {
            return Err(MismatchError::Discriminator(*address).into());
        }
        bincode::decode_from_slice(&data[DISCRIMINATOR_LEN..], layout())
            .map(|(state, _)| state)
            .map_err(|_| MismatchError::Discriminator(*address).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Sample {
        owner: Address,
        value: u64,
    }

    impl AccountState for Sample {
        const NAME: &'static str = "Sample";
        const SPACE: usize = DISCRIMINATOR_LEN + 32 + 8;
    }

    #[test]
    fn pack_then_unpack() {
        let addr = Address::new_from_array([1u8; 32]);
        let sample = Sample {
            owner: addr,
            value: 42,
        };
        let mut data = vec![0u8; Sample::SPACE];
        sample.pack_into(&mut data).unwrap();

        assert_eq!(&data[..8], &Sample::discriminator());
        assert_eq!(&data[40..48], &42u64.to_le_bytes());
        assert_eq!(Sample::unpack(&addr, &data).unwrap(), sample);
    }

    #[test]
    fn wrong_discriminator_rejected() {
        let addr = Address::new_from_array([1u8; 32]);
        let data = vec![0u8; Sample::SPACE];
        assert_eq!(
            Sample::unpack(&addr, &data),
            Err(MismatchError::Discriminator(addr).into())
        );

        let mut short = vec![0u8; Sample::SPACE - 1];
        assert!(Sample { owner: addr, value: 1 }.pack_into(&mut short).is_err());
    }

    #[test]
    fn rent_matches_schedule() {
        let rent = Rent::default();
        assert_eq!(rent.minimum_balance(0), 890_880);
        assert_eq!(rent.minimum_balance(48), (128 + 48) * 3_480 * 2);
    }

    #[test]
    fn tagged_instruction_data() {
        let ix = Instruction::new_with_tag(system::ID, 3, &(5u64, 6u8), vec![]);
        assert_eq!(ix.data[0], 3);
        let args: (u64, u8) = decode_args(&ix.data[1..]).unwrap();
        assert_eq!(args, (5, 6));
        assert!(decode_args::<(u64, u8)>(&ix.data[1..4]).is_err());
    }
}
