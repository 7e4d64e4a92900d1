use std::env;

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Domain appended to issued addresses (`<local_part>@<domain>`).
    pub domain: String,
    /// Fallback TTL for temporary emails when the system setting is absent.
    pub default_ttl_hours: i64,
    /// Fallback cap on live emails per user when the system setting is absent.
    pub default_max_emails_per_user: u64,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            domain: env::var("MAILCOVE_MAIL_DOMAIN").unwrap_or_else(|_| "mailcove.dev".to_string()),
            default_ttl_hours: env::var("MAILCOVE_TEMP_EMAIL_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            default_max_emails_per_user: env::var("MAILCOVE_MAX_EMAILS_PER_USER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}
