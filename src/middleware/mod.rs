pub mod auth;
pub mod cron_auth;
pub mod rate_limit;

pub use auth::{require_auth, AuthUser};
pub use cron_auth::require_cron_secret;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
