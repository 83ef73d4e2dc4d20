//! Password hashing for the Credential Store.
//!
//! Hashes are PBKDF2-HMAC-SHA256 with a random 16-byte salt and are encoded as
//! `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>` so the iteration count can
//! be raised later without invalidating existing accounts.
//!
//! Key derivation is CPU-bound; async callers go through
//! [`hash_password_blocking`] and [`verify_password_blocking`], which run it on
//! the blocking thread pool.

use crate::errors::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";

/// Iteration count for newly hashed passwords.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Hashes `password` with a fresh random salt and the given iteration count.
#[must_use]
pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let iterations = iterations.max(1);
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let key = derive_key(password, &salt, iterations);
    format!("{SCHEME}${iterations}${}${}", B64.encode(salt), B64.encode(key))
}

/// Checks `password` against an encoded hash.
///
/// Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (B64.decode(salt), B64.decode(expected)) else {
        return false;
    };

    let actual = derive_key(password, &salt, iterations);
    actual.ct_eq(expected.as_slice()).into()
}

/// Compares two secrets in constant time.
#[must_use]
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Hashes `password` on the blocking thread pool.
pub async fn hash_password_blocking(password: &str, iterations: u32) -> Result<String> {
    let password = password.to_string();
    let hash =
        tokio::task::spawn_blocking(move || hash_password_with_iterations(&password, iterations))
            .await?;
    Ok(hash)
}

/// Verifies `password` against `encoded` on the blocking thread pool.
pub async fn verify_password_blocking(password: &str, encoded: &str) -> Result<bool> {
    let password = password.to_string();
    let encoded = encoded.to_string();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &encoded)).await?;
    Ok(verified)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password_with_iterations("secret1", 1_000);
        assert!(hash.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password_with_iterations("secret1", 1_000);
        let b = hash_password_with_iterations("secret1", 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("secret1", "secret1"));
        assert!(!verify_password("secret1", ""));
        assert!(!verify_password("secret1", "pbkdf2-sha256$abc$AAAA$AAAA"));
        assert!(!verify_password("secret1", "md5$1$AAAA$AAAA"));
        assert!(!verify_password("secret1", "pbkdf2-sha256$1$!!$AAAA"));
    }

    #[test]
    fn test_truncated_hash_never_verifies() {
        let hash = hash_password_with_iterations("secret1", 1_000);
        let (prefix, key) = hash.rsplit_once('$').unwrap();
        let truncated = format!("{prefix}${}", B64.encode(&B64.decode(key).unwrap()[..16]));
        assert!(!verify_password("secret1", &truncated));
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("hunter22", "hunter22"));
        assert!(!secrets_match("hunter2", "hunter22"));
        assert!(!secrets_match("hunter23", "hunter22"));
        assert!(!secrets_match("", "hunter22"));
    }

    #[tokio::test]
    async fn test_blocking_wrappers_agree() -> Result<()> {
        let hash = hash_password_blocking("secret1", 1_000).await?;
        assert!(verify_password_blocking("secret1", &hash).await?);
        assert!(!verify_password_blocking("secret2", &hash).await?);
        Ok(())
    }
}
