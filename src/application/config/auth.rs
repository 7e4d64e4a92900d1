use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_private_key_path: PathBuf,
    pub jwt_public_key_path: PathBuf,
    /// Session token lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Fixed-window rate limit for /auth routes: max requests per window per IP.
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_private_key_path: env::var("MAILCOVE_JWT_PRIVATE_KEY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/etc/mailcove/jwt_private.pem")),
            jwt_public_key_path: env::var("MAILCOVE_JWT_PUBLIC_KEY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/etc/mailcove/jwt_public.pem")),
            session_ttl_secs: env::var("MAILCOVE_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(604_800), // 7 days
            rate_limit_max_requests: env::var("MAILCOVE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            rate_limit_window_secs: env::var("MAILCOVE_RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}
