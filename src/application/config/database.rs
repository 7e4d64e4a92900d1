use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("MAILCOVE_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://mailcove.db?mode=rwc".to_string()),
        }
    }
}
