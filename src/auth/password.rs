use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use tracing::error;

/// Random bytes behind a generated password; hex doubles the length.
const GENERATED_PASSWORD_BYTES: usize = 8;

lazy_static! {
    static ref DUMMY_DIGEST: Option<String> = Argon2Hasher.hash(&generate_password()).ok();
}

/// Argon2 digest of a random throwaway password. Login verifies against it
/// when the email is unknown so both paths do the same work.
pub fn dummy_digest() -> Option<&'static str> {
    DUMMY_DIGEST.as_deref()
}

/// Password digest capability used by the account services.
pub trait PasswordHashing: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    /// `Ok(false)` on mismatch; `Err` only for an unparsable digest.
    fn verify(&self, plain: &str, digest: &str) -> anyhow::Result<bool>;
}

#[derive(Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHashing for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, digest: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

/// 16 lowercase hex characters from 8 OS-random bytes.
pub fn generate_password() -> String {
    let mut bytes = [0u8; GENERATED_PASSWORD_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = Argon2Hasher;
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = Argon2Hasher;
        let hash = hasher
            .hash("correct-horse-battery-staple")
            .expect("hashing should succeed");
        assert!(!hasher
            .verify("wrong-password", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = Argon2Hasher.verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn dummy_digest_is_argon2_and_matches_nothing_guessable() {
        let digest = dummy_digest().expect("dummy digest");
        assert!(digest.starts_with("$argon2"));
        assert_eq!(dummy_digest(), Some(digest));
        assert!(!Argon2Hasher.verify("", digest).unwrap());
        assert!(!Argon2Hasher.verify("password", digest).unwrap());
    }

    #[test]
    fn generated_passwords_are_sixteen_hex_chars() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
