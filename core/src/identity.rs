//! Identities on the ledger: addresses, hashes, signatures and keypairs.

use core::fmt;
use core::str::FromStr;

use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand_core::OsRng;
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
#[cfg(feature = "json")]
use crate::serde::string_serde;

/// Length of an [`Address`] in bytes.
pub const ADDRESS_BYTES: usize = 32;

/// Length of a [`Signature`] in bytes.
pub const SIGNATURE_BYTES: usize = 64;

/// A 32-byte account address.
///
/// Keypair addresses are ed25519 public keys; derived addresses are
/// deliberately off the curve so that no private key exists for them.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(transparent))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Address(#[cfg_attr(feature = "json", serde(with = "string_serde"))] Bytes<ADDRESS_BYTES>);

impl Address {
    /// Wraps raw bytes.
    pub const fn new_from_array(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(Bytes(bytes))
    }

    /// Builds a fixed program identifier from a short name, zero-padded.
    pub const fn from_name(name: &[u8]) -> Self {
        let mut bytes = [0u8; ADDRESS_BYTES];
        let mut i = 0;
        while i < name.len() && i < ADDRESS_BYTES {
            bytes[i] = name[i];
            i += 1;
        }
        Self::new_from_array(bytes)
    }

    pub fn to_bytes(&self) -> [u8; ADDRESS_BYTES] {
        self.0 .0
    }

    /// Whether the bytes decompress to an ed25519 point.
    pub fn is_on_curve(&self) -> bool {
        VerifyingKey::from_bytes(&self.0 .0).is_ok()
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0 .0
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self::new_from_array(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    /// Parses base58, or hex when prefixed with `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A 32-byte digest, used for blockhashes.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(transparent))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Hash(#[cfg_attr(feature = "json", serde(with = "string_serde"))] Bytes<32>);

impl Hash {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(Bytes(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0 .0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.0)
    }
}

impl FromStr for Hash {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// An ed25519 signature over a transaction message.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(transparent))]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Signature(#[cfg_attr(feature = "json", serde(with = "string_serde"))] Bytes<SIGNATURE_BYTES>);

impl Signature {
    pub const fn new_from_array(bytes: [u8; SIGNATURE_BYTES]) -> Self {
        Self(Bytes(bytes))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_BYTES] {
        self.0 .0
    }

    /// Checks this signature over `message` against `signer`'s public key.
    pub fn verify(&self, signer: &Address, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&signer.to_bytes()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&self.0 .0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new_from_array([0u8; SIGNATURE_BYTES])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.0)
    }
}

impl FromStr for Signature {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Fixed-size byte string shared by the identity newtypes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bytes<const N: usize>([u8; N]);

impl<const N: usize> Encode for Bytes<N> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.0.encode(encoder)
    }
}

impl<Context, const N: usize> Decode<Context> for Bytes<N> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        <[u8; N]>::decode(decoder).map(Self)
    }
}

impl<'de, Context, const N: usize> BorrowDecode<'de, Context> for Bytes<N> {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Self::decode(decoder)
    }
}

impl<const N: usize> Default for Bytes<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> fmt::Display for Bytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

impl<const N: usize> FromStr for Bytes<N> {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentityError::EmptyIdentity);
        }
        let raw = match s.strip_prefix("0x") {
            Some(hex_str) => hex::decode(hex_str)?,
            None => bs58::decode(s).into_vec()?,
        };
        let bytes: [u8; N] = raw
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidLength {
                expected: N,
                actual: raw.len(),
            })?;
        Ok(Self(bytes))
    }
}

/// An ed25519 keypair able to sign transactions.
pub struct Keypair(SigningKey);

impl Keypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn new() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Deterministic keypair from a 32-byte secret.
    pub fn from_seed(secret: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(secret))
    }

    /// Parses the 64-byte `secret ‖ public` form used by keypair files.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let bytes: &[u8; 64] = bytes.try_into().map_err(|_| IdentityError::InvalidLength {
            expected: 64,
            actual: bytes.len(),
        })?;
        SigningKey::from_keypair_bytes(bytes)
            .map(Self)
            .map_err(|_| IdentityError::InvalidKeypair)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_keypair_bytes()
    }

    pub fn address(&self) -> Address {
        Address::new_from_array(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new_from_array(self.0.sign(message).to_bytes())
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.address()).finish()
    }
}
