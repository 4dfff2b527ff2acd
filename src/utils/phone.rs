use std::sync::LazyLock;

use regex::Regex;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone regex"));

/// Strips spaces, dashes, dots and parentheses, then checks the result looks like a phone number.
///
/// Returns the normalized form used as the lookup key in `users.phone`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if PHONE_RE.is_match(&cleaned) {
        Some(cleaned)
    } else {
        None
    }
}

/// `validator` hook for request DTOs carrying a phone number.
pub fn validate_phone(phone: &str) -> Result<(), validator::ValidationError> {
    match normalize_phone(phone) {
        Some(_) => Ok(()),
        None => Err(validator::ValidationError::new("invalid_phone_number")),
    }
}
