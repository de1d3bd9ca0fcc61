use std::str::FromStr;

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use hmac::digest::Digest;
use rand::Rng;

use crate::cell::HashBytes;

pub use self::mnemonic::{derive_from_phrase, validate_phrase};

mod mnemonic;

const LANGUAGE: ::bip39::Language = ::bip39::Language::English;

pub const DEFAULT_PATH: &str = "m/44'/607'/0'";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MnemonicType {
    /// 24 words, derived with PBKDF2 like the reference TON wallets
    Legacy,
    /// 12 words, derived along a BIP32 path
    Bip39,
}

impl FromStr for MnemonicType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "bip39" => Ok(Self::Bip39),
            _ => Err(anyhow::anyhow!(
                "unknown mnemonic type (neither `legacy` nor `bip39`)"
            )),
        }
    }
}

/// Generates a new seed phrase
pub fn generate_seed(mnemonic_type: MnemonicType) -> String {
    use ::bip39::util::{Bits11, IterExt};

    fn generate_words(entropy: &[u8]) -> Vec<&'static str> {
        let wordlist = LANGUAGE.wordlist();
        let checksum_byte = sha2::Sha256::digest(entropy)[0];

        entropy
            .iter()
            .chain(Some(&checksum_byte))
            .bits()
            .map(|bits: Bits11| wordlist.get_word(bits))
            .collect()
    }

    let rng = &mut rand::thread_rng();
    match mnemonic_type {
        MnemonicType::Legacy => generate_words(&rng.gen::<[u8; 32]>()),
        MnemonicType::Bip39 => generate_words(&rng.gen::<[u8; 16]>()),
    }
    .join(" ")
}

/// Builds a keypair from raw key material.
///
/// Accepts either a 32-byte secret or a 64-byte `secret || public` pair,
/// in which case the public half must match the secret.
pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, KeyError> {
    match bytes.len() {
        32 => {
            let secret = SecretKey::from_bytes(bytes).map_err(|_| KeyError::InvalidSecret)?;
            let public = PublicKey::from(&secret);
            Ok(Keypair { secret, public })
        }
        64 => {
            let (secret, public) = bytes.split_at(32);
            let keypair = keypair_from_bytes(secret)?;
            if keypair.public.as_bytes().as_slice() != public {
                return Err(KeyError::PublicKeyMismatch);
            }
            Ok(keypair)
        }
        len => Err(KeyError::InvalidLength(len)),
    }
}

pub fn sign_hash(hash: &HashBytes, keypair: &Keypair) -> [u8; 64] {
    keypair.sign(hash.as_slice()).to_bytes()
}

pub fn verify_hash(hash: &HashBytes, signature: &[u8; 64], public: &PublicKey) -> bool {
    match Signature::try_from(signature.as_slice()) {
        Ok(signature) => public.verify(hash.as_slice(), &signature).is_ok(),
        Err(_) => false,
    }
}

#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyError {
    #[error("invalid key length: {0} bytes")]
    InvalidLength(usize),
    #[error("invalid secret key")]
    InvalidSecret,
    #[error("public key does not match the secret key")]
    PublicKeyMismatch,
}
