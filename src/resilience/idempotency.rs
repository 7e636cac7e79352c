//! Idempotency keys for mutating upstream calls.
//!
//! Every call returns a fresh key. A logical operation that may be retried
//! (or redelivered) must generate its key once and reuse it.

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

const TOKEN_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 6;

/// `"{prefix}-{parts joined by '-'}-{unix_millis}-{random}"`.
pub fn generate_idempotency_key<I, D>(prefix: &str, parts: I) -> String
where
    I: IntoIterator<Item = D>,
    D: Display,
{
    let joined = parts
        .into_iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("-");
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();

    format!("{}-{}-{}-{}", prefix, joined, millis, random_token())
}

fn random_token() -> String {
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[fastrand::usize(..TOKEN_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_fresh() {
        let a = generate_idempotency_key("order", ["pkg123", "user@x.com"]);
        let b = generate_idempotency_key("order", ["pkg123", "user@x.com"]);

        assert_ne!(a, b);
        assert!(a.starts_with("order-pkg123-user@x.com-"));
        assert!(b.starts_with("order-pkg123-user@x.com-"));
    }

    #[test]
    fn test_key_layout() {
        let key = generate_idempotency_key("topup", [42, 7]);
        let rest = key.strip_prefix("topup-42-7-").unwrap();
        let (millis, token) = rest.split_once('-').unwrap();

        assert!(millis.parse::<u128>().unwrap() > 1_600_000_000_000);
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_no_parts() {
        let key = generate_idempotency_key("order", Vec::<String>::new());
        assert!(key.starts_with("order--"));
    }

    #[test]
    fn test_same_millisecond_keys_differ() {
        let keys: std::collections::HashSet<_> = (0..200)
            .map(|_| generate_idempotency_key("order", ["pkg"]))
            .collect();
        assert_eq!(keys.len(), 200);
    }
}
