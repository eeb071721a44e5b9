use bcrypt::{hash, verify, DEFAULT_COST};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Symbols accepted by the password policy.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Mínimo de 8 caracteres")]
    TooShort,
    #[error("Máximo de 128 caracteres")]
    TooLong,
    #[error("Pelo menos uma letra maiúscula")]
    NoUppercase,
    #[error("Pelo menos um número")]
    NoNumber,
    #[error("Pelo menos um símbolo especial (!@#$...)")]
    NoSpecialChar,
    #[error("Failed to hash password")]
    HashingFailed,
    #[error("Failed to verify password")]
    VerificationFailed,
}

/// Password strength requirements
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_number: bool,
    pub require_special_char: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_number: true,
            require_special_char: true,
        }
    }
}

/// Validate password strength according to policy.
///
/// Every failed rule is reported, in policy order, so the caller can show
/// the complete checklist at once.
pub fn validate_password_strength(password: &str, policy: &PasswordPolicy) -> Result<(), Vec<PasswordError>> {
    let mut errors = Vec::new();
    let length = password.chars().count();

    if length < policy.min_length {
        errors.push(PasswordError::TooShort);
    }

    if length > policy.max_length {
        errors.push(PasswordError::TooLong);
    }

    if policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(PasswordError::NoUppercase);
    }

    if policy.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(PasswordError::NoNumber);
    }

    if policy.require_special_char && !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        errors.push(PasswordError::NoSpecialChar);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Joins policy failures into a single message.
pub fn describe_password_errors(errors: &[PasswordError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash(password, DEFAULT_COST).map_err(|_| PasswordError::HashingFailed)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    verify(password, hash).map_err(|_| PasswordError::VerificationFailed)
}

/// Generate a secure random password reset token
pub fn generate_reset_token() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                            abcdefghijklmnopqrstuvwxyz\
                            0123456789";
    const TOKEN_LEN: usize = 32;

    let mut rng = rand::thread_rng();

    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Stable digest for tokens stored server-side.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_validation() {
        let policy = PasswordPolicy::default();

        assert_eq!(
            validate_password_strength("Ab1!", &policy),
            Err(vec![PasswordError::TooShort])
        );

        assert_eq!(
            validate_password_strength("lowercase123!", &policy),
            Err(vec![PasswordError::NoUppercase])
        );

        assert_eq!(
            validate_password_strength("Password!", &policy),
            Err(vec![PasswordError::NoNumber])
        );

        assert_eq!(
            validate_password_strength("Password123", &policy),
            Err(vec![PasswordError::NoSpecialChar])
        );

        assert!(validate_password_strength("Password123!", &policy).is_ok());
        assert!(validate_password_strength("Senha{2024}", &policy).is_ok());
    }

    #[test]
    fn reports_every_failure_together() {
        let errors = validate_password_strength("abc", &PasswordPolicy::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                PasswordError::TooShort,
                PasswordError::NoUppercase,
                PasswordError::NoNumber,
                PasswordError::NoSpecialChar,
            ]
        );
        assert_eq!(
            describe_password_errors(&errors[..2]),
            "Mínimo de 8 caracteres, Pelo menos uma letra maiúscula"
        );
    }

    #[test]
    fn symbols_outside_the_set_do_not_count() {
        assert_eq!(
            validate_password_strength("Password123_", &PasswordPolicy::default()),
            Err(vec![PasswordError::NoSpecialChar])
        );
    }

    #[test]
    fn test_password_hashing() {
        let password = "TestPassword123!";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("WrongPassword", &hash).unwrap());
    }

    #[test]
    fn test_reset_token_generation() {
        let token1 = generate_reset_token();
        let token2 = generate_reset_token();

        assert_eq!(token1.len(), 32);
        assert_ne!(token1, token2);
        assert_eq!(hash_token(&token1).len(), 64);
        assert_eq!(hash_token(&token1), hash_token(&token1));
    }
}
