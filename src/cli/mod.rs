use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;
use jetton_wallet::cell::{self, Cell};
use jetton_wallet::config::*;

use crate::dirs::*;

pub mod keys;
pub mod message;
pub mod wallet;

/// Jetton wallet message builder
#[derive(FromArgs)]
pub struct App {
    #[argh(subcommand)]
    command: Command,

    /// path to the root directory
    #[argh(option, default = "ProjectDirs::default_root_dir()")]
    root: PathBuf,
}

impl App {
    pub fn run(self) -> Result<()> {
        tracing::debug!("root dir {:?}", self.root);

        let ctx = CliContext::new(&self.root);

        match self.command {
            Command::Message(cmd) => cmd.run(ctx),
            Command::Wallet(cmd) => cmd.run(ctx),
            Command::Keys(cmd) => cmd.run(ctx),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Message(message::Cmd),
    Wallet(wallet::Cmd),
    Keys(keys::Cmd),
}

pub struct CliContext {
    dirs: ProjectDirs,
}

impl CliContext {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            dirs: ProjectDirs::new(root_dir),
        }
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        AppConfig::load_or_default(&self.dirs.app_config)
    }

    pub fn dirs(&self) -> &ProjectDirs {
        &self.dirs
    }

    /// Explicit path, then the path from the config, then the default keys file
    pub fn load_keys(&self, path: Option<&Path>) -> Result<ed25519_dalek::Keypair> {
        let config;
        let path = match path {
            Some(path) => path,
            None => {
                config = self.load_config()?;
                config
                    .keys
                    .as_deref()
                    .unwrap_or(self.dirs.permit_keys.as_path())
            }
        };

        tracing::debug!(?path, "loading keys");
        StoredKeys::load_as_keypair(path)
            .with_context(|| format!("failed to load keys from {}", path.display()))
    }
}

/// Summary of a built cell
pub fn cell_output(cell: &Cell) -> serde_json::Value {
    serde_json::json!({
        "hash": cell.hash().to_string(),
        "bits": cell.bit_len(),
        "refs": cell.references().len(),
        "boc": cell::serialize_boc_base64(cell),
    })
}
