use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use trustswap_core::interface::{read_keypair_file, LedgerSnapshot};
use trustswap_core::{Keypair, Ledger};

/// Reads JSON from `path`, or `None` if there is no such file.
pub fn load_json_if_present<P, T>(path: P) -> anyhow::Result<Option<T>>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(format!("opening file {:?}", path)),
    };
    serde_json::from_reader(file)
        .map(Some)
        .with_context(|| format!("parsing JSON from {:?}", path))
}

/// Writes JSON-encoded `data` to the given `path`,
/// creating parent directories as needed.
pub fn save_json_file<P, T>(path: P, data: &T) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {:?}", parent))?;
    }
    trustswap_core::interface::save_json(path, data)
}

/// Restores the ledger persisted at `path`.
pub fn load_ledger<P: AsRef<Path>>(path: P) -> anyhow::Result<Ledger> {
    let path = path.as_ref();
    match load_json_if_present::<_, LedgerSnapshot>(path)? {
        Some(snapshot) => Ok(Ledger::from_snapshot(snapshot)),
        None => anyhow::bail!(
            "Ledger file {:?} not found.
            Please create one with `trustswap init`",
            path
        ),
    }
}

pub fn save_ledger<P: AsRef<Path>>(path: P, ledger: &Ledger) -> anyhow::Result<()> {
    save_json_file(path, &ledger.snapshot())
}

/// Reads the signer keypair at `path`.
pub fn load_keypair<P: AsRef<Path>>(path: P) -> anyhow::Result<Keypair> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!(
            "Keypair file {:?} not found.
            Please create one with `trustswap keygen`",
            path
        );
    }
    read_keypair_file(path)
}
