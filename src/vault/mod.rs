//! Encryption-at-rest for stored provider credentials and API keys.
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext, the
//! whole blob base64 encoded. Decrypt runs a format sanity check first so a
//! column holding unmigrated plaintext fails loudly instead of producing
//! garbage.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("vault key is not valid base64")]
    InvalidKeyEncoding,

    #[error("ciphertext failed format check: {0}")]
    Format(&'static str),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed (wrong key or tampered ciphertext)")]
    Decrypt,

    #[error("decrypted secret is not valid UTF-8")]
    NotUtf8,
}

pub type VaultResult<T> = Result<T, VaultError>;

/// The credential vault. Constructed once at startup from the configured
/// key and injected wherever secrets are stored or revealed.
#[derive(Clone)]
pub struct Vault {
    key: Key<Aes256Gcm>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

impl Vault {
    /// Build a vault from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> VaultResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| VaultError::InvalidKeyEncoding)?;
        if bytes.len() != 32 {
            return Err(VaultError::InvalidKeyLength(bytes.len()));
        }
        Ok(Self {
            key: *Key::<Aes256Gcm>::from_slice(&bytes),
        })
    }

    /// Encrypt a secret. Output layout: `base64(nonce || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Rejects input that cannot be a vault blob (bad base64, shorter than
    /// nonce + GCM tag) before touching the cipher, so stray plaintext in a
    /// credential column is detected as a format error.
    pub fn decrypt(&self, encoded: &str) -> VaultResult<String> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|_| VaultError::Format("not base64"))?;
        // 16-byte GCM tag follows the nonce even for empty plaintext
        if blob.len() < NONCE_LEN + 16 {
            return Err(VaultError::Format("too short for nonce and tag"));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::NotUtf8)
    }
}

/// SHA-256 digest of a secret, hex encoded. Keyless on purpose: digests are
/// lookup columns, not recoverable material.
pub fn digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn test_vault() -> Vault {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Vault::from_base64_key(&BASE64.encode(key)).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let vault = test_vault();
        let ct = vault.encrypt("sk-ant-secret-token").unwrap();
        assert_eq!(vault.decrypt(&ct).unwrap(), "sk-ant-secret-token");
    }

    #[test]
    fn test_round_trip_empty_and_unicode() {
        let vault = test_vault();
        for secret in ["", "héllo wörld 日本語"] {
            let ct = vault.encrypt(secret).unwrap();
            assert_eq!(vault.decrypt(&ct).unwrap(), secret);
        }
    }

    #[test]
    fn test_nonce_makes_ciphertexts_differ() {
        let vault = test_vault();
        let a = vault.encrypt("same input").unwrap();
        let b = vault.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_decrypt() {
        let a = test_vault();
        let b = test_vault();
        let ct = a.encrypt("secret").unwrap();
        assert!(matches!(b.decrypt(&ct), Err(VaultError::Decrypt)));
    }

    #[test]
    fn test_plaintext_rejected_by_format_check() {
        let vault = test_vault();
        // An unmigrated raw API key is not base64 (contains '_')
        assert!(matches!(
            vault.decrypt("gk_live_unmigrated_plaintext"),
            Err(VaultError::Format(_))
        ));
        // Valid base64 but too short to hold nonce + tag
        assert!(matches!(
            vault.decrypt(&BASE64.encode(b"short")),
            Err(VaultError::Format(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let vault = test_vault();
        let ct = vault.encrypt("secret").unwrap();
        let mut blob = BASE64.decode(&ct).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(
            vault.decrypt(&BASE64.encode(blob)),
            Err(VaultError::Decrypt)
        ));
    }

    #[test]
    fn test_key_length_enforced() {
        let short = BASE64.encode([0u8; 16]);
        assert!(matches!(
            Vault::from_base64_key(&short),
            Err(VaultError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            Vault::from_base64_key("not base64!!"),
            Err(VaultError::InvalidKeyEncoding)
        ));
    }

    #[test]
    fn test_digest_shape() {
        let d = digest("secret");
        assert_eq!(d.len(), 64);
        assert_eq!(d, digest("secret"));
        assert_ne!(d, digest("other"));
    }
}
