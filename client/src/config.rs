use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::load_json_if_present;

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_PATH: &str = "./trustswap.json";
pub const DEFAULT_LEDGER_PATH: &str = "./trustswap-ledger.json";
pub const DEFAULT_KEYPAIR_PATH: &str = "./trustswap-keypair.json";

/// Where the CLI keeps its ledger snapshot and signing keypair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// JSON ledger snapshot, loaded before and saved after each command.
    pub ledger_path: PathBuf,
    /// Keypair file of the signer (see `trustswap keygen`).
    pub keypair_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ledger_path: DEFAULT_LEDGER_PATH.into(),
            keypair_path: DEFAULT_KEYPAIR_PATH.into(),
        }
    }
}

impl ClientConfig {
    /// Reads `path` if it exists, falling back to the defaults otherwise.
    /// Fields missing from the file keep their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(load_json_if_present(path)?.unwrap_or_default())
    }

    /// Applies command-line overrides on top of the loaded values.
    pub fn with_overrides(mut self, ledger: Option<PathBuf>, keypair: Option<PathBuf>) -> Self {
        if let Some(ledger) = ledger {
            self.ledger_path = ledger;
        }
        if let Some(keypair) = keypair {
            self.keypair_path = keypair;
        }
        self
    }
}
