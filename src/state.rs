use sea_orm::DatabaseConnection;

use crate::services::audit::AuditService;
use crate::services::webhook::WebhookDispatcher;

/// Database connection type alias
pub type DbConn = DatabaseConnection;

/// Application state containing all shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DbConn,
    pub audit: AuditService,
    pub webhooks: WebhookDispatcher,
}

impl AppState {
    pub fn new(db: DbConn) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            webhooks: WebhookDispatcher::new(db.clone()),
            db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{Database, DatabaseConnection};

    async fn create_db() -> DatabaseConnection {
        Database::connect("sqlite::memory:")
            .await
            .expect("Failed to create test database")
    }

    #[tokio::test]
    async fn test_app_state_new() {
        let db = create_db().await;
        let state = AppState::new(db);

        // Should be cloneable
        let _cloned = state.clone();
    }

    #[test]
    fn test_db_conn_type_alias() {
        // DbConn is an alias for DatabaseConnection
        fn _accepts_db_conn(_db: &DbConn) {}
        fn _accepts_database_connection(_db: &DatabaseConnection) {}
    }
}
