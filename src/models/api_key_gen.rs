//! API key generation, hashing, and verification.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Prefix carried by every issued key; lets log scrubbers and the
/// header-classification step recognize key material cheaply.
pub const API_KEY_PREFIX: &str = "gk_live_";

/// Number of characters of the key stored for display purposes.
const DISPLAY_PREFIX_LEN: usize = 12;

/// Generate a new API key: prefix plus 32 random bytes, base64url encoded.
/// Returns `(plaintext_key, display_prefix)`.
pub fn generate_api_key() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let key = format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes));
    let prefix = key.chars().take(DISPLAY_PREFIX_LEN).collect();
    (key, prefix)
}

/// SHA-256 digest of the plaintext key, hex encoded. This is the lookup
/// column; the plaintext never reaches the store.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a candidate key against a stored digest.
pub fn verify_api_key(candidate: &str, stored_hash: &str) -> bool {
    let candidate_hash = hash_api_key(candidate);
    candidate_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// Whether a header value looks like one of our keys.
pub fn has_valid_prefix(value: &str) -> bool {
    value.starts_with(API_KEY_PREFIX)
}
