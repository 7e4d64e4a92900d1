pub mod auth;
pub mod permissions;
pub mod rate_limit;

pub use auth::{require_auth, AuthenticatedUser, SESSION_COOKIE_NAME};
pub use permissions::{Authenticated, Authorized};
pub use rate_limit::rate_limit;
