use bcrypt::{DEFAULT_COST, hash, verify};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(bcrypt::BcryptError),
    #[error("Password verification failed: {0}")]
    VerificationFailed(bcrypt::BcryptError),
}

/// Credential hashing capability. bcrypt is a black box here: the service
/// only relies on `verify(p, hash(p)) == true` and one-wayness.
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn hash(password: &str) -> Result<String, PasswordError> {
        hash(password, DEFAULT_COST).map_err(PasswordError::HashingFailed)
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool, PasswordError> {
        verify(password, hash).map_err(PasswordError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::PasswordHasher;

    #[test]
    fn verify_accepts_the_original_password() {
        let hashed = PasswordHasher::hash("Str0ng!Pass").expect("hashing failed");
        assert!(PasswordHasher::verify("Str0ng!Pass", &hashed).expect("verification failed"));
    }

    #[test]
    fn verify_rejects_a_different_password() {
        let hashed = PasswordHasher::hash("Str0ng!Pass").expect("hashing failed");
        assert!(!PasswordHasher::verify("0ther!Pass9", &hashed).expect("verification failed"));
    }

    #[test]
    fn verify_is_case_sensitive() {
        let hashed = PasswordHasher::hash("MyPassword1").expect("hashing failed");
        let result = PasswordHasher::verify("mypassword1", &hashed);
        // Mismatch is a `false`, not an error.
        assert!(result.is_ok());
        assert!(!result.unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let hash1 = PasswordHasher::hash("same_password1A").unwrap();
        let hash2 = PasswordHasher::hash("same_password1A").unwrap();
        assert_ne!(hash1, hash2);
    }
}
