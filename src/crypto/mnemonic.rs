use anyhow::{Context, Result};
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use hmac::{Mac, NewMac};
use tiny_hderive::bip32::ExtendedPrivKey;

use super::{MnemonicType, LANGUAGE};

type HmacSha512 = hmac::Hmac<sha2::Sha512>;

pub fn validate_phrase(phrase: &str, mnemonic_type: MnemonicType) -> Result<()> {
    match mnemonic_type {
        MnemonicType::Legacy => validate_legacy(phrase),
        MnemonicType::Bip39 => {
            bip39::Mnemonic::from_phrase(phrase, LANGUAGE)?;
            Ok(())
        }
    }
}

pub fn derive_from_phrase(
    phrase: &str,
    mnemonic_type: MnemonicType,
    path: &str,
) -> Result<Keypair> {
    let secret = match mnemonic_type {
        MnemonicType::Legacy => derive_legacy(phrase)?,
        MnemonicType::Bip39 => derive_bip39(phrase, path)?,
    };
    let public = PublicKey::from(&secret);
    Ok(Keypair { secret, public })
}

fn validate_legacy(phrase: &str) -> Result<()> {
    const WORD_COUNT: usize = 24;

    let wordmap = LANGUAGE.wordmap();
    let mut word_count = 0;
    for word in phrase.split_whitespace() {
        word_count += 1;
        anyhow::ensure!(word_count <= WORD_COUNT, "expected {WORD_COUNT} words");
        wordmap
            .get_bits(word)
            .with_context(|| format!("unknown word `{word}`"))?;
    }
    anyhow::ensure!(word_count == WORD_COUNT, "expected {WORD_COUNT} words");
    Ok(())
}

fn derive_legacy(phrase: &str) -> Result<SecretKey> {
    const PBKDF_ITERATIONS: u32 = 100_000;
    const SALT: &[u8] = b"TON default seed";

    validate_legacy(phrase)?;

    let password = HmacSha512::new_from_slice(phrase.as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid seed phrase"))?
        .finalize()
        .into_bytes();

    let mut seed = [0; 64];
    pbkdf2::pbkdf2::<HmacSha512>(&password, SALT, PBKDF_ITERATIONS, &mut seed);

    SecretKey::from_bytes(&seed[..32]).context("invalid derived key")
}

fn derive_bip39(phrase: &str, path: &str) -> Result<SecretKey> {
    let mnemonic = bip39::Mnemonic::from_phrase(phrase, LANGUAGE)?;
    let seed = bip39::Seed::new(&mnemonic, "");

    let derived = ExtendedPrivKey::derive(seed.as_bytes(), path)
        .map_err(|_| anyhow::anyhow!("invalid derivation path"))?;

    SecretKey::from_bytes(&derived.secret()).context("invalid derived key")
}
