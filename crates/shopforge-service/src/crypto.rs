//! Secret generation and comparison utilities.
//!
//! Used for tenant secret material (SSO/webhook secrets, session secrets)
//! and for authenticating inbound webhook bearer tokens.

use rand::RngCore;

/// Number of random bytes in a generated secret (hex-doubled on output).
const SECRET_BYTES: usize = 32;

/// Generate a fresh random secret, hex-encoded (64 characters).
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Used when comparing inbound webhook bearer tokens against stored
/// secrets.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_unique_and_hex() {
        let a = generate_secret();
        let b = generate_secret();

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn constant_time_eq_equal_strings() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn constant_time_eq_different_strings() {
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }
}
