//! Magic-link tokens for rescheduling public bookings.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex SHA-256 of `"{booking_id}-{secret}"`.
pub fn reschedule_token(booking_id: Uuid, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{booking_id}-{secret}").as_bytes());
    hex::encode(hasher.finalize())
}

pub fn validate_reschedule_token(booking_id: Uuid, token: &str, secret: &str) -> bool {
    constant_time_eq(reschedule_token(booking_id, secret).as_bytes(), token.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_deterministic_hex() {
        let id = Uuid::parse_str("7f1c2a3e-0000-4000-8000-000000000001").unwrap();
        let token = reschedule_token(id, "s3cret");
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token, reschedule_token(id, "s3cret"));
        assert_ne!(token, reschedule_token(id, "other"));
    }

    #[test]
    fn validation() {
        let id = Uuid::new_v4();
        let token = reschedule_token(id, "k");
        assert!(validate_reschedule_token(id, &token, "k"));
        assert!(!validate_reschedule_token(Uuid::new_v4(), &token, "k"));
        assert!(!validate_reschedule_token(id, &token[..63], "k"));
        assert!(!validate_reschedule_token(id, "", "k"));
    }
}
