//! Address issuance rules: local-part validation, random generation, and the
//! permanent-email expiry sentinel.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::Rng;

use crate::config::CONFIG;
use crate::error::{AppError, Result};

const LOCAL_PART_MAX_LEN: usize = 40;
const RANDOM_LOCAL_PART_LEN: usize = 10;

/// Expiry timestamp stored on permanent emails.
static PERMANENT_EXPIRY: Lazy<DateTime<Utc>> =
    Lazy::new(|| Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0).unwrap());

/// The sentinel `expires_at` for permanent emails (far future).
pub fn permanent_expiry() -> DateTime<Utc> {
    *PERMANENT_EXPIRY
}

/// Validate a requested local part.
///
/// Lowercase alphanumerics plus `.`, `_` and `-`; must start and end with an
/// alphanumeric and may not contain consecutive dots.
pub fn validate_local_part(local_part: &str) -> Result<()> {
    if local_part.is_empty() || local_part.len() > LOCAL_PART_MAX_LEN {
        return Err(AppError::BadRequest(format!(
            "Local part must be 1-{} characters",
            LOCAL_PART_MAX_LEN
        )));
    }

    let valid_chars = local_part
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if !valid_chars {
        return Err(AppError::BadRequest(
            "Local part may only contain lowercase letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    let first = local_part.chars().next().unwrap_or(' ');
    let last = local_part.chars().last().unwrap_or(' ');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(AppError::BadRequest(
            "Local part must start and end with a letter or digit".to_string(),
        ));
    }

    if local_part.contains("..") {
        return Err(AppError::BadRequest(
            "Local part may not contain consecutive dots".to_string(),
        ));
    }

    Ok(())
}

/// Generate a random lowercase alphanumeric local part
pub fn random_local_part() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..RANDOM_LOCAL_PART_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Compose the full address for a local part using the configured domain
pub fn compose_address(local_part: &str) -> String {
    format!("{}@{}", local_part, CONFIG.mail.domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_local_parts() {
        for lp in ["alice", "a", "bob.smith", "x_y-z9", "42"] {
            assert!(validate_local_part(lp).is_ok(), "{} should be valid", lp);
        }
    }

    #[test]
    fn test_invalid_local_parts() {
        for lp in ["", "Alice", ".dot", "dot.", "a..b", "sp ace", "ümlaut"] {
            assert!(validate_local_part(lp).is_err(), "{} should be invalid", lp);
        }
    }

    #[test]
    fn test_local_part_length_limit() {
        let long = "a".repeat(LOCAL_PART_MAX_LEN);
        assert!(validate_local_part(&long).is_ok());
        let too_long = "a".repeat(LOCAL_PART_MAX_LEN + 1);
        assert!(validate_local_part(&too_long).is_err());
    }

    #[test]
    fn test_random_local_part_is_valid() {
        for _ in 0..20 {
            let lp = random_local_part();
            assert!(validate_local_part(&lp).is_ok());
        }
    }

    #[test]
    fn test_permanent_expiry_is_far_future() {
        assert!(permanent_expiry() > chrono::Utc::now() + chrono::Duration::days(365 * 100));
    }
}
