use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use jetton_wallet::config::StoredKeys;
use jetton_wallet::crypto::{self, MnemonicType};
use zeroize::Zeroizing;

use super::CliContext;
use crate::util::*;

#[derive(FromArgs)]
/// Permit signer keys
#[argh(subcommand, name = "keys")]
pub struct Cmd {
    #[argh(subcommand)]
    subcommand: SubCmd,
}

impl Cmd {
    pub fn run(self, ctx: CliContext) -> Result<()> {
        match self.subcommand {
            SubCmd::Generate(cmd) => cmd.run(ctx),
            SubCmd::Derive(cmd) => cmd.run(ctx),
            SubCmd::Pubkey(cmd) => cmd.run(ctx),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCmd {
    Generate(CmdGenerate),
    Derive(CmdDerive),
    Pubkey(CmdPubkey),
}

#[derive(Debug, PartialEq, FromArgs)]
/// Generates new seed
#[argh(subcommand, name = "generate")]
struct CmdGenerate {
    /// mnemonic type
    #[argh(option, long = "type", short = 't', default = "MnemonicType::Bip39")]
    ty: MnemonicType,

    /// save derived keys to the keys file
    #[argh(switch)]
    store: bool,

    /// path to the keys file (default: `keys/permit.keys.json` in the root dir)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

impl CmdGenerate {
    fn run(self, ctx: CliContext) -> Result<()> {
        if !self.store {
            print_output(crypto::generate_seed(self.ty));
            return Ok(());
        }

        anyhow::ensure!(
            self.ty == StoredKeys::DEFAULT_MNEMONIC_TYPE,
            "only bip39 seeds can be stored"
        );

        let keys = StoredKeys::generate()?;
        let path = store_keys(&ctx, self.output, &keys)?;
        tracing::info!(path = %path.display(), "generated new keys");

        print_output(serde_json::json!({
            "path": path,
            "public": hex::encode(keys.as_keypair()?.public.as_bytes()),
        }));
        Ok(())
    }
}

#[derive(Debug, PartialEq, FromArgs)]
/// Derives the permit signer key from a seed phrase
#[argh(subcommand, name = "derive")]
struct CmdDerive {
    /// seed phrase or empty for input from stdin
    #[argh(positional)]
    phrase: Option<String>,

    /// mnemonic type
    #[argh(option, long = "type", short = 't', default = "MnemonicType::Bip39")]
    ty: MnemonicType,

    /// derivation path for bip39 mnemonic
    #[argh(option, short = 'p')]
    path: Option<String>,

    /// save derived keys to the keys file instead of printing the secret
    #[argh(switch)]
    store: bool,

    /// path to the keys file (default: `keys/permit.keys.json` in the root dir)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

impl CmdDerive {
    fn run(self, ctx: CliContext) -> Result<()> {
        let phrase = Zeroizing::new(String::from_utf8(parse_optional_input(self.phrase, true)?)?);
        let path = self.path.as_deref().unwrap_or(crypto::DEFAULT_PATH);
        let keys = derive_keys(&phrase, self.ty, path)?;
        let public = keys.as_keypair()?.public;

        if self.store {
            let path = store_keys(&ctx, self.output, &keys)?;
            tracing::info!(path = %path.display(), "stored derived keys");
            print_output(serde_json::json!({
                "path": path,
                "public": hex::encode(public.as_bytes()),
            }));
        } else {
            print_output(serde_json::json!({
                "secret": hex::encode(keys.secret.as_slice()),
                "public": hex::encode(public.as_bytes()),
            }));
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, FromArgs)]
/// Prints the public key of the permit signer
#[argh(subcommand, name = "pubkey")]
struct CmdPubkey {
    /// path to the signer keys file
    #[argh(option)]
    keys: Option<PathBuf>,

    /// raw secret key (32 or 64 bytes) in hex or base64, read from stdin with `-`
    #[argh(option)]
    secret: Option<String>,

    /// encode the key in base64 (hex by default)
    #[argh(switch)]
    base64: bool,
}

impl CmdPubkey {
    fn run(self, ctx: CliContext) -> Result<()> {
        let keypair = match self.secret {
            Some(secret) => {
                let secret = parse_secret(secret)?;
                crypto::keypair_from_bytes(&secret).context("invalid secret key")?
            }
            None => ctx.load_keys(self.keys.as_deref())?,
        };

        let public = keypair.public.as_bytes();
        print_output(if self.base64 {
            base64::encode(public)
        } else {
            hex::encode(public)
        });
        Ok(())
    }
}

/// Keeps the phrase only when it restores the same key with the default settings
fn derive_keys(phrase: &str, ty: MnemonicType, path: &str) -> Result<StoredKeys> {
    let phrase = phrase.trim();
    if ty == StoredKeys::DEFAULT_MNEMONIC_TYPE && path == crypto::DEFAULT_PATH {
        return StoredKeys::from_seed(phrase);
    }

    let keypair = crypto::derive_from_phrase(phrase, ty, path)?;
    Ok(StoredKeys {
        secret: Zeroizing::new(keypair.secret.to_bytes()),
        public: Some(keypair.public.to_bytes()),
        seed: None,
    })
}

fn store_keys(ctx: &CliContext, output: Option<PathBuf>, keys: &StoredKeys) -> Result<PathBuf> {
    let path = match output {
        Some(path) => path,
        None => {
            ctx.dirs().prepare_keys_dir()?;
            ctx.dirs().permit_keys.clone()
        }
    };
    anyhow::ensure!(!path.exists(), "keys file already exists: {}", path.display());

    keys.store(&path)?;
    Ok(path)
}
