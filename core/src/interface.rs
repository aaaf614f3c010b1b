//! Core types for JSON (de)serialization of ledger snapshots, escrow metadata
//! and keypair files.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PdaError;
use crate::escrow::{vault_address, EscrowRecord, EscrowState};
use crate::identity::{Address, Keypair};
pub use crate::ledger::LedgerSnapshot;

/// Reads a JSON-encoded file from the given `path` and deserializes into type `T`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be opened, read, or parsed.
///
/// # Examples
///
/// ```ignore
/// # use trustswap_core::interface::{load_json, LedgerSnapshot};
///
/// let snapshot: LedgerSnapshot = load_json("./ledger.json").unwrap();
/// ```
pub fn load_json<P, T>(path: P) -> anyhow::Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let content =
        std::fs::read_to_string(path).with_context(|| format!("loading {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing JSON from {:?}", path))
}

/// Writes `data` (serializable) as pretty-printed JSON to the given `path`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be created or data cannot be serialized.
pub fn save_json<P, T>(path: P, data: &T) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating file {:?}", path))?;
    serde_json::to_writer_pretty(file, data)
        .with_context(|| format!("serializing to JSON to {:?}", path))
}

/// Reads a keypair file: a JSON array of the 64 `secret ‖ public` bytes.
pub fn read_keypair_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Keypair> {
    let path = path.as_ref();
    let bytes: Vec<u8> = load_json(path)?;
    Keypair::from_bytes(&bytes).with_context(|| format!("invalid keypair in {:?}", path))
}

/// Writes `keypair` in the format [`read_keypair_file`] expects.
pub fn write_keypair_file<P: AsRef<Path>>(path: P, keypair: &Keypair) -> anyhow::Result<()> {
    save_json(path, &keypair.to_bytes().to_vec())
}

/// Metadata **returned** from opening an escrow, enough to take or refund it
/// later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowMetadata {
    /// The derived record address.
    pub escrow: Address,
    /// Custodial account holding the offered amount.
    pub vault: Address,
    pub maker: Address,
    pub mint_offered: Address,
    pub mint_requested: Address,
    pub amount_offered: u64,
    pub amount_requested: u64,
    pub seed: u64,
    pub bump: u8,
    /// Where in the lifecycle the escrow currently is.
    pub state: EscrowState,
}

impl EscrowMetadata {
    /// Describes an open escrow from its stored record.
    pub fn open(
        escrow: Address,
        record: &EscrowRecord,
        amount_offered: u64,
    ) -> Result<Self, PdaError> {
        Ok(Self {
            escrow,
            vault: vault_address(&escrow, &record.mint_offered)?,
            maker: record.maker,
            mint_offered: record.mint_offered,
            mint_requested: record.mint_requested,
            amount_offered,
            amount_requested: record.amount_requested,
            seed: record.seed,
            bump: record.bump,
            state: EscrowState::Open,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("trustswap-{}-{}", std::process::id(), name))
    }

    #[test]
    fn keypair_file_roundtrip() {
        let path = temp_path("keypair.json");
        let kp = Keypair::from_seed(&[3u8; 32]);
        write_keypair_file(&path, &kp).unwrap();

        let restored = read_keypair_file(&path).unwrap();
        assert_eq!(restored.address(), kp.address());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn metadata_serializes_state_lowercase() {
        let record = EscrowRecord {
            seed: 7,
            maker: Address::new_from_array([1u8; 32]),
            mint_offered: Address::new_from_array([2u8; 32]),
            mint_requested: Address::new_from_array([3u8; 32]),
            amount_requested: 50,
            bump: 255,
        };
        let meta =
            EscrowMetadata::open(Address::new_from_array([4u8; 32]), &record, 100).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["state"], "open");
        assert_eq!(json["amount_offered"], 100);

        let path = temp_path("metadata.json");
        save_json(&path, &meta).unwrap();
        let loaded: EscrowMetadata = load_json(&path).unwrap();
        assert_eq!(loaded, meta);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_json::<_, EscrowMetadata>(temp_path("absent.json")).unwrap_err();
        assert!(format!("{:?}", err).contains("absent.json"));
    }
}
