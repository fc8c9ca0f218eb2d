//! Session nonce generation and validation.

use uuid::Uuid;

/// Generate a 128-bit session nonce as 36-character lowercase hyphenated hex.
pub fn generate_nonce() -> String {
    Uuid::new_v4().to_string()
}

/// Validate an externally supplied token before it touches the store:
/// 1–100 characters, lowercase hex digits and separators only, and not
/// separators alone.
pub fn is_valid_nonce(token: &str) -> bool {
    if token.is_empty() || token.len() > 100 {
        return false;
    }
    if !token
        .chars()
        .all(|c| matches!(c, '0'..='9' | 'a'..='f' | '-'))
    {
        return false;
    }
    token.chars().any(|c| c != '-')
}
