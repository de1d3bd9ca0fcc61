use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const ENV: &str = "JETTON_WALLET_ROOT";

pub struct ProjectDirs {
    pub app_config: PathBuf,
    pub keys_dir: PathBuf,
    pub permit_keys: PathBuf,
}

impl ProjectDirs {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        let root = root_dir.as_ref();

        let keys_dir = root.join("keys");
        let permit_keys = keys_dir.join("permit.keys.json");

        Self {
            app_config: root.join("config.toml"),
            keys_dir,
            permit_keys,
        }
    }

    pub fn default_root_dir() -> PathBuf {
        if let Ok(path) = std::env::var(ENV) {
            PathBuf::from(path)
        } else {
            default_root_dir()
        }
    }

    pub fn prepare_keys_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.keys_dir).context("failed to create keys directory")
    }
}

fn default_root_dir() -> PathBuf {
    const DEFAULT_ROOT_DIR: &str = ".jetton-wallet";

    match home::home_dir() {
        Some(home) => home.join(DEFAULT_ROOT_DIR),
        None => PathBuf::from(DEFAULT_ROOT_DIR),
    }
}
