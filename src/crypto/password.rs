use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::AppError;

const MIN_PASSWORD_LEN: usize = 8;

const COMMON_WORDS: &[&str] = &[
    "password", "admin", "qwerty", "abc123", "letmein", "welcome", "monkey", "dragon",
    "master", "sunshine", "princess", "login", "hello", "world", "computer", "internet",
    "website", "email", "phone", "house", "home", "friend", "family", "love", "time",
    "work", "school", "student", "teacher", "people", "person", "woman", "good", "happy",
];

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; 32] {
    rand::thread_rng().gen()
}

/// URL-safe random token used for verification, reset and OAuth state links.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(43)
        .map(char::from)
        .collect()
}

/// Hash a password with Argon2id using the provided salt
pub fn hash_password(password: &str, salt: &[u8]) -> Result<[u8; 32], AppError> {
    let argon2 = Argon2::default();
    let mut hash = [0u8; 32];

    argon2
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash)
}

/// Verify a password against a stored hash and salt
pub fn verify_password(password: &str, stored_hash: &[u8], salt: &[u8]) -> Result<bool, AppError> {
    let computed_hash = hash_password(password, salt)?;
    Ok(computed_hash.as_slice() == stored_hash)
}

/// Reject passwords that are too short or built around a common word.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let lowered = password.to_lowercase();
    if COMMON_WORDS
        .iter()
        .filter(|w| w.len() >= 4)
        .any(|w| lowered.contains(w))
    {
        return Err(AppError::BadRequest(
            "Password must not contain common dictionary words".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify() {
        let password = "test_password_123";
        let salt = generate_salt();

        let hash = hash_password(password, &salt).unwrap();
        assert!(verify_password(password, &hash, &salt).unwrap());
        assert!(!verify_password("wrong_password", &hash, &salt).unwrap());
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("MyPassword99").is_err());
        assert!(validate_password("Hello-there-77").is_err());
        assert!(validate_password("Zq8!vkTr2m").is_ok());
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }
}
