//! Password hashing. Stored hashes are argon2id PHC strings with a random salt.

use anyhow::{anyhow, Context};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("argon2 hash: {e}"))
}

/// `Ok(false)` for a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow!("{e}"))
        .context("stored password hash is not a PHC string")?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("argon2 verify: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_never_contains_the_password() {
        let hash = hash_password("wonderland-42").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("wonderland-42"));
        assert!(verify_password("wonderland-42", &hash).unwrap());
        assert!(!verify_password("wonderland-43", &hash).unwrap());
    }

    #[test]
    fn salts_differ_per_hash() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error_not_a_mismatch() {
        let err = verify_password("anything", "plaintext-in-db").unwrap_err();
        assert!(err.to_string().contains("PHC"));
    }
}
