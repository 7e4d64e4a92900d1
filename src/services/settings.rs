//! Typed access to the `system_settings` key/value table.

use sea_orm::EntityTrait;

use crate::config::CONFIG;
use crate::error::Result;
use crate::models::prelude::*;
use crate::state::DbConn;

pub const REGISTRATION_ENABLED: &str = "registration_enabled";
pub const TEMP_EMAIL_TTL_HOURS: &str = "temp_email_ttl_hours";
pub const MAX_EMAILS_PER_USER: &str = "max_emails_per_user";

/// Keys an admin may change through the settings endpoint
pub const KNOWN_KEYS: &[&str] = &[
    REGISTRATION_ENABLED,
    TEMP_EMAIL_TTL_HOURS,
    MAX_EMAILS_PER_USER,
];

pub async fn get_setting(db: &DbConn, key: &str) -> Result<Option<String>> {
    Ok(SystemSetting::find_by_id(key)
        .one(db)
        .await?
        .map(|s| s.value))
}

pub async fn registration_enabled(db: &DbConn) -> Result<bool> {
    Ok(get_setting(db, REGISTRATION_ENABLED)
        .await?
        .map(|v| v == "true")
        .unwrap_or(true))
}

pub async fn temp_email_ttl_hours(db: &DbConn) -> Result<i64> {
    Ok(get_setting(db, TEMP_EMAIL_TTL_HOURS)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(CONFIG.mail.default_ttl_hours))
}

pub async fn max_emails_per_user(db: &DbConn) -> Result<u64> {
    Ok(get_setting(db, MAX_EMAILS_PER_USER)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(CONFIG.mail.default_max_emails_per_user))
}

/// Validate a settings write before it is applied
pub fn validate_setting(key: &str, value: &str) -> std::result::Result<(), String> {
    match key {
        REGISTRATION_ENABLED => match value {
            "true" | "false" => Ok(()),
            _ => Err(format!("{} must be 'true' or 'false'", key)),
        },
        TEMP_EMAIL_TTL_HOURS => match value.parse::<i64>() {
            Ok(h) if (1..=720).contains(&h) => Ok(()),
            _ => Err(format!("{} must be an integer between 1 and 720", key)),
        },
        MAX_EMAILS_PER_USER => match value.parse::<u64>() {
            Ok(n) if (1..=1000).contains(&n) => Ok(()),
            _ => Err(format!("{} must be an integer between 1 and 1000", key)),
        },
        _ => Err(format!("Unknown setting: {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_registration_enabled() {
        assert!(validate_setting(REGISTRATION_ENABLED, "true").is_ok());
        assert!(validate_setting(REGISTRATION_ENABLED, "false").is_ok());
        assert!(validate_setting(REGISTRATION_ENABLED, "yes").is_err());
    }

    #[test]
    fn test_validate_ttl_bounds() {
        assert!(validate_setting(TEMP_EMAIL_TTL_HOURS, "24").is_ok());
        assert!(validate_setting(TEMP_EMAIL_TTL_HOURS, "0").is_err());
        assert!(validate_setting(TEMP_EMAIL_TTL_HOURS, "721").is_err());
        assert!(validate_setting(TEMP_EMAIL_TTL_HOURS, "abc").is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(validate_setting("no_such_key", "1").is_err());
    }
}
