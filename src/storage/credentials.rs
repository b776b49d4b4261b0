use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::{thread_rng, RngCore};
use crate::common::{AttendanceError, Result};

const SALT_SIZE: usize = 16;

/// Argon2id hash in PHC string form, with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    thread_rng().fill_bytes(&mut salt);

    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| AttendanceError::Other(anyhow::anyhow!("Failed to encode password salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AttendanceError::Other(anyhow::anyhow!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Checks `password` against a value produced by [`hash_password`].
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("Lachoo").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password(&stored, "Lachoo"));
        assert!(!verify_password(&stored, "lachoo"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("", "x"));
        assert!(!verify_password("md5$abc$def", "x"));
        assert!(!verify_password("$argon2id$v=19$m=19456,t=2,p=1$!!$??", "x"));
    }

    #[test]
    fn fast_hmac_hashes_are_not_accepted() {
        assert!(!verify_password("hmac-sha256$c2FsdA$dGFn", "Lachoo"));
    }
}
