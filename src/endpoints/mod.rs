pub mod api_keys;
pub mod audit;
pub mod auth;
pub mod codes;
pub mod emails;
pub mod extractors;
pub mod roles;
pub mod settings;
pub mod students;
pub mod users;
pub mod webhooks;

use axum::{middleware as axum_middleware, Router};

use crate::config::CONFIG;
use crate::middleware::require_auth;
use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", axum::routing::get(health_check))
        .route("/api/system/version", axum::routing::get(get_version))
        .nest("/auth", auth::auth_routes(state.clone()));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .nest("/api", api_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(state, require_auth));

    // Merge public and protected routes
    public_routes.merge(protected_routes)
}

/// API routes under /api/* (protected by auth middleware)
fn api_routes(state: AppState) -> Router {
    Router::new()
        .nest("/users", users::users_routes(state.clone()))
        .nest("/emails", emails::emails_routes(state.clone()))
        .nest("/keys", api_keys::api_keys_routes(state.clone()))
        .nest("/webhook", webhooks::webhook_routes(state.clone()))
        .nest("/roles", roles::roles_routes(state.clone()))
        .nest("/admin/users", users::admin_users_routes(state.clone()))
        .nest("/admin/emails", emails::admin_emails_routes(state.clone()))
        .nest("/admin/students", students::students_routes(state.clone()))
        .nest("/admin/codes", codes::codes_routes(state.clone()))
        .nest("/admin/settings", settings::settings_routes(state.clone()))
        .nest("/admin/audit", audit::audit_routes(state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Version info endpoint
async fn get_version() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "version": CONFIG.version,
        "backend": "rust"
    }))
}
