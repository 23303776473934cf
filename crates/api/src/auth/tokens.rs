//! Access token generation and hashing
//!
//! Bearer tokens are opaque: a prefixed random value handed to the caller
//! once, with only its SHA-256 hash stored. Lookup hashes the presented
//! token and matches against the stored hash, so a database leak never
//! exposes usable credentials.

use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "tg_";

/// Generate a new access token
///
/// Returns a 32-byte hex-encoded random value with a recognizable prefix.
pub fn generate_access_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

/// Hash a token for storage and lookup
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
