use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

// Something, an @, something, a dot, something. No whitespace.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn email(email: &str) -> Result<(), ApiError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ApiError::InvalidEmail)
    }
}

pub fn username(username: &str) -> Result<(), ApiError> {
    if USERNAME_LEN.contains(&username.chars().count()) && !username.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ApiError::InvalidUsername)
    }
}

pub fn password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::PasswordTooShort)
    }
}

/// Parse a path id, returning it in canonical hyphenated form.
pub fn id(raw: &str) -> Result<String, ApiError> {
    raw.parse::<Uuid>()
        .map(|id| id.to_string())
        .map_err(|_| ApiError::InvalidId)
}

/// Treat empty or whitespace-only strings as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
