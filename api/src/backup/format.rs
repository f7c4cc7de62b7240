//! Encrypted backup container
//!
//! ```text
//! MAGIC  8 bytes   "INKSTBK1"
//! HLEN   4 bytes   big-endian length of the header JSON
//! HEADER HLEN bytes
//! BODY   AES-256-GCM ciphertext, header bytes as associated data
//! TAG    16 bytes
//! ```
//!
//! The key is derived from a passphrase with scrypt; the KDF parameters and
//! salt travel in the header so old artifacts stay readable.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::entities::BackupKind;
use crate::error::BackupError;

pub const MAGIC: &[u8; 8] = b"INKSTBK1";
pub const FORMAT_VERSION: u32 = 1;
/// Magic plus header length
pub const PREFIX_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const CIPHER_NAME: &str = "aes-256-gcm";
pub const KDF_NAME: &str = "scrypt";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const MAX_HEADER_LEN: usize = 64 * 1024;

/// scrypt cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

impl KdfParams {
    /// Bounds accepted when reading a header
    fn check(&self) -> Result<(), BackupError> {
        let in_range = (1..=20).contains(&self.log_n)
            && (1..=32).contains(&self.r)
            && (1..=16).contains(&self.p);
        if !in_range {
            return Err(BackupError::Format(format!(
                "Unsupported scrypt parameters: log_n={} r={} p={}",
                self.log_n, self.r, self.p
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdfHeader {
    pub name: String,
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
    /// Base64
    pub salt: String,
}

/// Plaintext header stored in front of the ciphertext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupHeader {
    pub version: u32,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub source_name: String,
    pub plain_size: u64,
    /// Hex SHA-256 of the plaintext
    pub sha256: String,
    pub kdf: KdfHeader,
    pub cipher: String,
    /// Base64
    pub nonce: String,
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<[u8; KEY_LEN], BackupError> {
    params.check()?;
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, KEY_LEN)
        .map_err(|e| BackupError::Crypto(format!("Invalid scrypt parameters: {}", e)))?;

    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(passphrase.as_bytes(), salt, &scrypt_params, &mut key)
        .map_err(|e| BackupError::Crypto(format!("Key derivation failed: {}", e)))?;
    Ok(key)
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Encrypt `plain` into a complete artifact
pub fn encrypt(
    plain: &[u8],
    passphrase: &str,
    kind: BackupKind,
    source_name: &str,
    params: KdfParams,
) -> Result<Vec<u8>, BackupError> {
    if passphrase.is_empty() {
        return Err(BackupError::Config("Backup passphrase is empty".to_string()));
    }

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let header = BackupHeader {
        version: FORMAT_VERSION,
        kind,
        created_at: Utc::now(),
        source_name: source_name.to_string(),
        plain_size: plain.len() as u64,
        sha256: sha256_hex(plain),
        kdf: KdfHeader {
            name: KDF_NAME.to_string(),
            log_n: params.log_n,
            r: params.r,
            p: params.p,
            salt: BASE64.encode(salt),
        },
        cipher: CIPHER_NAME.to_string(),
        nonce: BASE64.encode(nonce),
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| BackupError::Format(format!("Cannot encode header: {}", e)))?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| BackupError::Format("Header too large".to_string()))?;

    let key = derive_key(passphrase, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| BackupError::Crypto(format!("Invalid key: {}", e)))?;
    // aes-gcm appends the tag to the ciphertext
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plain,
                aad: &header_bytes,
            },
        )
        .map_err(|_| BackupError::Crypto("Encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(PREFIX_LEN + header_bytes.len() + sealed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&header_len.to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Validate the magic and return the header length announced by the prefix
pub fn header_length(prefix: &[u8]) -> Result<usize, BackupError> {
    if prefix.len() < PREFIX_LEN {
        return Err(BackupError::Format("File is truncated".to_string()));
    }
    if &prefix[..MAGIC.len()] != MAGIC {
        return Err(BackupError::Format("Not an Inkstone backup".to_string()));
    }

    let mut len = [0u8; 4];
    len.copy_from_slice(&prefix[MAGIC.len()..PREFIX_LEN]);
    let len = u32::from_be_bytes(len) as usize;
    if len == 0 || len > MAX_HEADER_LEN {
        return Err(BackupError::Format(format!("Invalid header length {}", len)));
    }
    Ok(len)
}

/// Decode and check a header
pub fn parse_header(bytes: &[u8]) -> Result<BackupHeader, BackupError> {
    let header: BackupHeader = serde_json::from_slice(bytes)
        .map_err(|e| BackupError::Format(format!("Invalid header: {}", e)))?;

    if header.version != FORMAT_VERSION {
        return Err(BackupError::Format(format!(
            "Unsupported backup version {}",
            header.version
        )));
    }
    if header.cipher != CIPHER_NAME {
        return Err(BackupError::Format(format!("Unsupported cipher {}", header.cipher)));
    }
    if header.kdf.name != KDF_NAME {
        return Err(BackupError::Format(format!("Unsupported KDF {}", header.kdf.name)));
    }
    Ok(header)
}

/// Read only the header of an artifact
pub fn read_header(data: &[u8]) -> Result<BackupHeader, BackupError> {
    let header_len = header_length(data)?;
    let end = PREFIX_LEN + header_len;
    if data.len() < end {
        return Err(BackupError::Format("File is truncated".to_string()));
    }
    parse_header(&data[PREFIX_LEN..end])
}

/// Decrypt an artifact and verify its checksum
pub fn decrypt(data: &[u8], passphrase: &str) -> Result<(BackupHeader, Vec<u8>), BackupError> {
    let header_len = header_length(data)?;
    let body_start = PREFIX_LEN + header_len;
    if data.len() < body_start + TAG_LEN {
        return Err(BackupError::Format("File is truncated".to_string()));
    }

    let header_bytes = &data[PREFIX_LEN..body_start];
    let header = parse_header(header_bytes)?;

    let salt = BASE64
        .decode(&header.kdf.salt)
        .map_err(|_| BackupError::Format("Invalid salt encoding".to_string()))?;
    let nonce = BASE64
        .decode(&header.nonce)
        .map_err(|_| BackupError::Format("Invalid nonce encoding".to_string()))?;
    if nonce.len() != NONCE_LEN {
        return Err(BackupError::Format("Invalid nonce length".to_string()));
    }

    let params = KdfParams {
        log_n: header.kdf.log_n,
        r: header.kdf.r,
        p: header.kdf.p,
    };
    let key = derive_key(passphrase, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| BackupError::Crypto(format!("Invalid key: {}", e)))?;

    let plain = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &data[body_start..],
                aad: header_bytes,
            },
        )
        .map_err(|_| {
            BackupError::Crypto("Wrong passphrase or corrupted backup".to_string())
        })?;

    if plain.len() as u64 != header.plain_size || sha256_hex(&plain) != header.sha256 {
        return Err(BackupError::Crypto("Checksum mismatch".to_string()));
    }

    Ok((header, plain))
}
