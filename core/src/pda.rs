//! Program-derived addresses.
//!
//! A derived address is `sha256(seeds ‖ program_id ‖ "ProgramDerivedAddress")`,
//! accepted only when the digest is *not* a valid ed25519 point. No private key
//! can therefore sign for it; only the owning program can, by re-presenting the
//! seeds to [`crate::runtime::InstructionContext::invoke_signed`].

use sha2::{Digest, Sha256};

use crate::error::PdaError;
use crate::identity::Address;
use crate::programs::{associated_token, token};

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Derives the address for `seeds` under `program_id`, failing if it lands on
/// the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<Address, PdaError> {
    if seeds.len() > MAX_SEEDS {
        return Err(PdaError::MaxSeedsExceeded(seeds.len()));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(PdaError::MaxSeedLengthExceeded(seed.len()));
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id);
    hasher.update(PDA_MARKER);
    let address = Address::new_from_array(hasher.finalize().into());

    if address.is_on_curve() {
        return Err(PdaError::OnCurve);
    }
    Ok(address)
}

/// Searches bumps from 255 downward and returns the first off-curve address.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), PdaError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(PdaError::MaxSeedsExceeded(seeds.len() + 1));
    }
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(PdaError::OnCurve) => {}
            Err(e) => return Err(e),
        }
    }
    Err(PdaError::NoViableBump)
}

/// Associated token account of `wallet` for `mint`.
///
/// Seeds are `[wallet, token_program_id, mint]` under the associated-token
/// program, so the address is fixed by the (wallet, mint) pair alone.
pub fn associated_token_address(
    wallet: &Address,
    mint: &Address,
) -> Result<(Address, u8), PdaError> {
    find_program_address(
        &[wallet.as_ref(), token::ID.as_ref(), mint.as_ref()],
        &associated_token::ID,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;

    #[test]
    fn derivation_is_deterministic_and_off_curve() {
        let program = Address::from_name(b"escrow");
        let maker = Keypair::from_seed(&[1u8; 32]).address();
        let seed = 7u64.to_le_bytes();

        let (addr, bump) = find_program_address(&[b"escrow", maker.as_ref(), &seed], &program)
            .unwrap();
        let again = find_program_address(&[b"escrow", maker.as_ref(), &seed], &program).unwrap();
        assert_eq!((addr, bump), again);
        assert!(!addr.is_on_curve());

        let recreated =
            create_program_address(&[b"escrow", maker.as_ref(), &seed, &[bump]], &program)
                .unwrap();
        assert_eq!(recreated, addr);
    }

    #[test]
    fn different_inputs_give_different_addresses() {
        let program = Address::from_name(b"escrow");
        let other_program = Address::from_name(b"counter");
        let maker = Keypair::from_seed(&[1u8; 32]).address();

        let (a, _) = find_program_address(&[b"escrow", maker.as_ref(), &1u64.to_le_bytes()], &program)
            .unwrap();
        let (b, _) = find_program_address(&[b"escrow", maker.as_ref(), &2u64.to_le_bytes()], &program)
            .unwrap();
        let (c, _) = find_program_address(
            &[b"escrow", maker.as_ref(), &1u64.to_le_bytes()],
            &other_program,
        )
        .unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn seed_limits_enforced() {
        let program = Address::from_name(b"escrow");
        let long = [0u8; 33];
        assert_eq!(
            create_program_address(&[&long], &program),
            Err(PdaError::MaxSeedLengthExceeded(33))
        );

        let seed: &[u8] = b"x";
        let many = vec![seed; 17];
        assert_eq!(
            create_program_address(&many, &program),
            Err(PdaError::MaxSeedsExceeded(17))
        );
    }

    #[test]
    fn associated_address_depends_on_wallet_and_mint() {
        let wallet = Keypair::from_seed(&[4u8; 32]).address();
        let mint_a = Keypair::from_seed(&[5u8; 32]).address();
        let mint_b = Keypair::from_seed(&[6u8; 32]).address();

        let (ata_a, _) = associated_token_address(&wallet, &mint_a).unwrap();
        let (ata_b, _) = associated_token_address(&wallet, &mint_b).unwrap();
        assert_ne!(ata_a, ata_b);
        assert_eq!(associated_token_address(&wallet, &mint_a).unwrap().0, ata_a);
    }
}
