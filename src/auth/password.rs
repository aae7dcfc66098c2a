//! Account password hashing.
//!
//! Stored hashes are Argon2id PHC strings (`$argon2id$v=19$...`) with a fresh
//! random salt per hash, so two accounts with the same password never share a
//! `password_hash` value. Length rules (6..=128 characters) are enforced on the
//! request DTOs before anything reaches this module.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Hashes a signup or reset password for storage in `users.password_hash`.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!("hash password: {e}")
        })?;
    Ok(hash.to_string())
}

/// Checks a login attempt against a stored hash. `Ok(false)` is a wrong
/// password; `Err` means the stored value is not a PHC string at all.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is unreadable");
        anyhow::anyhow!("parse password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_argon2id_phc() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("secret1"));
    }

    #[test]
    fn shortest_and_longest_accepted_passwords_verify() {
        for password in ["abcdef".to_string(), "p".repeat(128)] {
            let hash = hash_password(&password).unwrap();
            assert!(verify_password(&password, &hash).unwrap());
        }
    }

    #[test]
    fn non_ascii_password_verifies() {
        let hash = hash_password("пароль-密码").unwrap();
        assert!(verify_password("пароль-密码", &hash).unwrap());
        assert!(!verify_password("пароль", &hash).unwrap());
    }

    #[test]
    fn accounts_with_same_password_get_distinct_hashes() {
        assert_ne!(hash_password("secret1").unwrap(), hash_password("secret1").unwrap());
    }

    #[test]
    fn login_with_wrong_password_is_false_not_error() {
        let hash = hash_password("secret1").unwrap();
        assert!(!verify_password("secret2", &hash).unwrap());
        assert!(!verify_password(" secret1", &hash).unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        assert!(verify_password("secret1", "plaintext-secret1").is_err());
    }
}
