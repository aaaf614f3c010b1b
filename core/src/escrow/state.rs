use bincode::{Decode, Encode};
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

use crate::account::{AccountState, DISCRIMINATOR_LEN};
use crate::identity::Address;

/// One pending swap offer, stored at the address derived from
/// (`maker`, `seed`).
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EscrowRecord {
    /// Caller-chosen nonce; lets one maker hold several offers.
    pub seed: u64,
    pub maker: Address,
    pub mint_offered: Address,
    pub mint_requested: Address,
    /// Exact quantity of `mint_requested` the maker accepts.
    pub amount_requested: u64,
    pub bump: u8,
}

impl AccountState for EscrowRecord {
    const NAME: &'static str = "EscrowRecord";
    const SPACE: usize = DISCRIMINATOR_LEN + 8 + 32 * 3 + 8 + 1;
}

/// Lifecycle of an offer as seen from outside a transaction.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowState {
    /// Record and vault exist; the offered amount is locked.
    Open,
    /// Taker paid the maker and received the vault contents.
    Taken,
    /// Maker reclaimed the vault contents.
    Refunded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_fits_space() {
        let record = EscrowRecord {
            seed: 7,
            maker: Address::new_from_array([1u8; 32]),
            mint_offered: Address::new_from_array([2u8; 32]),
            mint_requested: Address::new_from_array([3u8; 32]),
            amount_requested: 50,
            bump: 254,
        };
        let mut data = vec![0u8; EscrowRecord::SPACE];
        record.pack_into(&mut data).unwrap();

        assert_eq!(&data[8..16], &7u64.to_le_bytes());
        assert_eq!(data[EscrowRecord::SPACE - 1], 254);
        assert_eq!(EscrowRecord::unpack(&record.maker, &data).unwrap(), record);
    }
}
