use std::path::Path;

use anyhow::{Context, Result};
use broxus_util::{serde_hex_array, serde_optional_hex_array};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::*;

#[derive(Debug, Serialize)]
pub struct StoredKeys {
    #[serde(with = "serde_hex_array")]
    pub secret: Zeroizing<[u8; 32]>,
    #[serde(
        with = "serde_optional_hex_array",
        skip_serializing_if = "Option::is_none"
    )]
    pub public: Option<[u8; 32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

impl StoredKeys {
    pub const DEFAULT_MNEMONIC_TYPE: MnemonicType = MnemonicType::Bip39;

    pub fn generate() -> Result<Self> {
        Self::from_seed(generate_seed(Self::DEFAULT_MNEMONIC_TYPE))
    }

    pub fn from_seed<T: AsRef<str>>(seed: T) -> Result<Self> {
        fn inner(seed: &str) -> Result<StoredKeys> {
            let seed = seed.trim().to_owned();
            let keypair =
                derive_from_phrase(&seed, StoredKeys::DEFAULT_MNEMONIC_TYPE, DEFAULT_PATH)?;
            Ok(StoredKeys {
                secret: Zeroizing::new(keypair.secret.to_bytes()),
                public: Some(keypair.public.to_bytes()),
                seed: Some(seed),
            })
        }

        inner(seed.as_ref())
    }

    pub fn load_as_keypair<P: AsRef<Path>>(path: P) -> Result<ed25519_dalek::Keypair> {
        Self::load(path)?.as_keypair()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path).context("failed to read keys file")?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct StoredKeysHelper {
            #[serde(default, with = "serde_optional_hex_array")]
            secret: Option<[u8; 32]>,
            #[serde(default, with = "serde_optional_hex_array")]
            public: Option<[u8; 32]>,
            #[serde(default)]
            seed: Option<String>,
        }

        let mut deserializer = serde_json::Deserializer::from_str(data);
        let data: StoredKeysHelper =
            serde_path_to_error::deserialize(&mut deserializer).context("failed to parse keys")?;

        let keys = if let Some(secret) = data.secret {
            StoredKeys {
                secret: Zeroizing::new(secret),
                public: data.public,
                seed: data.seed,
            }
        } else if let Some(seed) = data.seed {
            StoredKeys::from_seed(seed)?
        } else {
            anyhow::bail!("invalid keys file")
        };

        // Stored public key must belong to the secret
        keys.as_keypair()?;
        Ok(keys)
    }

    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to serialize keys")?;
        std::fs::write(path, data).context("failed to save keys")
    }

    pub fn as_keypair(&self) -> Result<ed25519_dalek::Keypair> {
        let keypair = keypair_from_bytes(self.secret.as_slice()).context("invalid secret key")?;
        if let Some(public) = &self.public {
            anyhow::ensure!(
                keypair.public.as_bytes() == public,
                "public key does not match the secret key"
            );
        }
        Ok(keypair)
    }
}
