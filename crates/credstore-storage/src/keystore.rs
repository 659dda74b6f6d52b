//! Keystore container codec.
//!
//! A keystore file is a JSON envelope:
//!
//! ```text
//! { version, store_type, mac, kdf_iterations, salt, payload, tag }
//! ```
//!
//! PBKDF2-HMAC-SHA512 over the passphrase and a random salt yields 64 bytes:
//! the first half keys AES-256-GCM for each entry (alias bound as associated
//! data), the second half keys the container MAC. `tag` covers the header
//! fields and the raw payload, so a wrong passphrase and a tampered file are
//! indistinguishable and both fail before any entry is decrypted.

use std::{fmt, str::FromStr};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use credstore_core::{settings::DEFAULT_KDF_ITERATIONS, CredentialEntry};
use hmac::{Hmac, Mac};
use indexmap::{map::Entry, IndexMap};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::passphrase::Passphrase;

const FORMAT_VERSION: u32 = 1;
const MAGIC: &str = "credstore-keystore";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
/// Upper bound accepted from a file header.
const MAX_KDF_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed keystore: {reason}")]
    Malformed { reason: String },
    #[error("unsupported keystore version {found}")]
    UnsupportedVersion { found: u32 },
    #[error("keystore type mismatch: expected {expected}, found {found}")]
    StoreTypeMismatch { expected: StoreType, found: String },
    #[error("keystore algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch { expected: MacAlgorithm, found: String },
    #[error("keystore integrity check failed (wrong passphrase or tampered file)")]
    IntegrityCheckFailed,
    #[error("failed to decrypt entry {alias}")]
    Decrypt { alias: String },
    #[error("failed to encrypt entry {alias}")]
    Encrypt { alias: String },
    #[error("duplicate alias {alias} in keystore")]
    DuplicateAlias { alias: String },
    #[error("invalid key derivation iteration count {iterations}")]
    InvalidIterations { iterations: u32 },
    #[error("unknown {kind} identifier `{value}`")]
    UnknownIdentifier { kind: &'static str, value: String },
}

/// Container type recorded in the file and checked on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    Bcfks,
    Jceks,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Bcfks => "bcfks",
            StoreType::Jceks => "jceks",
        }
    }
}

impl FromStr for StoreType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bcfks" => Ok(StoreType::Bcfks),
            "jceks" => Ok(StoreType::Jceks),
            _ => Err(CodecError::UnknownIdentifier {
                kind: "store type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integrity algorithm stamped over the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    HmacSha512,
    HmacSha256,
}

impl MacAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacAlgorithm::HmacSha512 => "HMACSHA512",
            MacAlgorithm::HmacSha256 => "HMACSHA256",
        }
    }

    fn sign(&self, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CodecError> {
        Ok(match self {
            MacAlgorithm::HmacSha512 => keyed::<Hmac<Sha512>>(key, parts)?
                .finalize()
                .into_bytes()
                .to_vec(),
            MacAlgorithm::HmacSha256 => keyed::<Hmac<Sha256>>(key, parts)?
                .finalize()
                .into_bytes()
                .to_vec(),
        })
    }

    /// Constant-time comparison against `tag`.
    fn verify(&self, key: &[u8], parts: &[&[u8]], tag: &[u8]) -> Result<(), CodecError> {
        let checked = match self {
            MacAlgorithm::HmacSha512 => keyed::<Hmac<Sha512>>(key, parts)?.verify_slice(tag),
            MacAlgorithm::HmacSha256 => keyed::<Hmac<Sha256>>(key, parts)?.verify_slice(tag),
        };
        checked.map_err(|_| CodecError::IntegrityCheckFailed)
    }
}

impl FromStr for MacAlgorithm {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HMACSHA512" => Ok(MacAlgorithm::HmacSha512),
            "HMACSHA256" => Ok(MacAlgorithm::HmacSha256),
            _ => Err(CodecError::UnknownIdentifier {
                kind: "algorithm",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn keyed<M>(key: &[u8], parts: &[&[u8]]) -> Result<M, CodecError>
where
    M: Mac + hmac::digest::KeyInit,
{
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|e| CodecError::Malformed {
        reason: format!("mac key: {e}"),
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedKeyStore {
    version: u32,
    store_type: String,
    mac: String,
    kdf_iterations: u32,
    salt: String,
    payload: String,
    tag: String,
}

impl SealedKeyStore {
    fn header(&self) -> String {
        format!(
            "{MAGIC}\n{}\n{}\n{}\n{}\n{}\n",
            self.version, self.store_type, self.mac, self.kdf_iterations, self.salt
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    alias: String,
    nonce: String,
    ciphertext: String,
}

/// PBKDF2 output: encryption key followed by MAC key.
struct DerivedKeys(Zeroizing<[u8; 2 * KEY_LEN]>);

impl DerivedKeys {
    fn derive(passphrase: &Passphrase, salt: &[u8], iterations: u32) -> Self {
        let mut out = Zeroizing::new([0u8; 2 * KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), salt, iterations, &mut out[..]);
        Self(out)
    }

    fn cipher(&self) -> Result<Aes256Gcm, CodecError> {
        Aes256Gcm::new_from_slice(&self.0[..KEY_LEN]).map_err(|e| CodecError::Malformed {
            reason: format!("cipher init failed: {e}"),
        })
    }

    fn mac_key(&self) -> &[u8] {
        &self.0[KEY_LEN..]
    }
}

/// Serializes credential entries into a protected container and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStoreCodec {
    store_type: StoreType,
    algorithm: MacAlgorithm,
    iterations: u32,
}

impl KeyStoreCodec {
    pub fn new(store_type: StoreType, algorithm: MacAlgorithm) -> Self {
        Self {
            store_type,
            algorithm,
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }

    /// Rounds used when encoding. Decoding always uses the count stored in the file.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn algorithm(&self) -> MacAlgorithm {
        self.algorithm
    }

    pub fn encode<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a CredentialEntry>,
        passphrase: &Passphrase,
    ) -> Result<Vec<u8>, CodecError> {
        check_iterations(self.iterations)?;

        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let keys = DerivedKeys::derive(passphrase, &salt, self.iterations);
        let cipher = keys.cipher()?;

        let stored = entries
            .into_iter()
            .map(|entry| {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(
                        &nonce,
                        Payload {
                            msg: entry.secret(),
                            aad: entry.alias().as_bytes(),
                        },
                    )
                    .map_err(|_| CodecError::Encrypt {
                        alias: entry.alias().to_string(),
                    })?;
                Ok(StoredEntry {
                    alias: entry.alias().to_string(),
                    nonce: STANDARD.encode(nonce.as_slice()),
                    ciphertext: STANDARD.encode(ciphertext),
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        let payload = serde_json::to_vec(&stored).map_err(malformed)?;

        let mut sealed = SealedKeyStore {
            version: FORMAT_VERSION,
            store_type: self.store_type.as_str().to_string(),
            mac: self.algorithm.as_str().to_string(),
            kdf_iterations: self.iterations,
            salt: STANDARD.encode(salt),
            payload: STANDARD.encode(&payload),
            tag: String::new(),
        };
        let tag = self.algorithm.sign(
            keys.mac_key(),
            &[sealed.header().as_bytes(), payload.as_slice()],
        )?;
        sealed.tag = STANDARD.encode(tag);

        serde_json::to_vec_pretty(&sealed).map_err(malformed)
    }

    pub fn decode(
        &self,
        bytes: &[u8],
        passphrase: &Passphrase,
    ) -> Result<IndexMap<String, CredentialEntry>, CodecError> {
        let sealed: SealedKeyStore = serde_json::from_slice(bytes).map_err(malformed)?;

        if sealed.version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: sealed.version,
            });
        }
        if sealed.store_type.parse::<StoreType>().ok() != Some(self.store_type) {
            return Err(CodecError::StoreTypeMismatch {
                expected: self.store_type,
                found: sealed.store_type,
            });
        }
        if sealed.mac.parse::<MacAlgorithm>().ok() != Some(self.algorithm) {
            return Err(CodecError::AlgorithmMismatch {
                expected: self.algorithm,
                found: sealed.mac,
            });
        }
        check_iterations(sealed.kdf_iterations)?;

        let salt = STANDARD.decode(&sealed.salt).map_err(malformed)?;
        let payload = STANDARD.decode(&sealed.payload).map_err(malformed)?;
        let tag = STANDARD.decode(&sealed.tag).map_err(malformed)?;

        let keys = DerivedKeys::derive(passphrase, &salt, sealed.kdf_iterations);
        self.algorithm.verify(
            keys.mac_key(),
            &[sealed.header().as_bytes(), payload.as_slice()],
            &tag,
        )?;

        let stored: Vec<StoredEntry> = serde_json::from_slice(&payload).map_err(malformed)?;
        let cipher = keys.cipher()?;
        let mut entries = IndexMap::with_capacity(stored.len());
        for item in stored {
            let nonce = STANDARD.decode(&item.nonce).map_err(malformed)?;
            if nonce.len() != NONCE_LEN {
                return Err(CodecError::Malformed {
                    reason: format!("nonce for {} has length {}", item.alias, nonce.len()),
                });
            }
            let ciphertext = STANDARD.decode(&item.ciphertext).map_err(malformed)?;
            let secret = cipher
                .decrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: &ciphertext,
                        aad: item.alias.as_bytes(),
                    },
                )
                .map_err(|_| CodecError::Decrypt {
                    alias: item.alias.clone(),
                })?;

            match entries.entry(item.alias) {
                Entry::Occupied(slot) => {
                    return Err(CodecError::DuplicateAlias {
                        alias: slot.key().clone(),
                    })
                }
                Entry::Vacant(slot) => {
                    let alias = slot.key().clone();
                    slot.insert(CredentialEntry::new(alias, secret));
                }
            }
        }
        Ok(entries)
    }
}

fn check_iterations(iterations: u32) -> Result<(), CodecError> {
    if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
        return Err(CodecError::InvalidIterations { iterations });
    }
    Ok(())
}

fn malformed<E: ToString>(err: E) -> CodecError {
    CodecError::Malformed {
        reason: err.to_string(),
    }
}
