use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cell::{self, Cell, StdAddr};
use crate::contracts::JettonWalletConfig;

/// Tool config
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Workchain of the jetton wallet
    pub workchain: i8,

    /// Wallet owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<StdAddr>,

    /// Jetton minter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minter: Option<StdAddr>,

    /// Default permit treasury
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treasury: Option<StdAddr>,

    /// Path to the wallet code BOC (raw or base64)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_code: Option<PathBuf>,

    /// Path to the permit signer keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<PathBuf>,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path).context("failed to read app config")?;
        Self::from_toml(&data)
    }

    /// Returns the default config if the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(?path, "app config not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let mut td = toml::Deserializer::new(data);
        serde_path_to_error::deserialize(&mut td).context("failed to parse app config")
    }

    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = toml::to_string_pretty(self).context("failed to serialize app config")?;
        std::fs::write(path, data).context("failed to write app config")
    }

    pub fn load_wallet_code(&self) -> Result<Cell> {
        let path = self
            .wallet_code
            .as_ref()
            .context("wallet code path is not specified")?;
        load_boc_file(path)
    }

    pub fn wallet_config(&self) -> Result<JettonWalletConfig> {
        Ok(JettonWalletConfig {
            owner: self.owner.context("wallet owner is not specified")?,
            minter: self.minter.context("jetton minter is not specified")?,
            wallet_code: self.load_wallet_code()?,
        })
    }
}

/// Reads a bag of cells stored either as raw bytes or as base64 text
pub fn load_boc_file<P: AsRef<Path>>(path: P) -> Result<Cell> {
    let data = std::fs::read(path.as_ref()).context("failed to read BOC file")?;
    let cell = match cell::deserialize_boc(&data) {
        Ok(cell) => cell,
        Err(_) => {
            let text = std::str::from_utf8(&data).context("invalid BOC file")?;
            cell::deserialize_boc_base64(text).context("invalid BOC file")?
        }
    };
    Ok(cell)
}
