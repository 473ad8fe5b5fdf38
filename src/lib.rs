//! Arcana: tarot readings, gamification and credit-funded subscriptions.
//!
//! The binary in `main.rs` wires configuration, the database pool and the
//! router defined in `handlers`. Everything else lives here so the tools in
//! `src/bin/` and the integration tests can use it.

pub mod config;
pub mod database;
pub mod deck;
pub mod errors;
pub mod gamification;
pub mod handlers;
pub mod interpretation;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod referrals;
pub mod renewal;
pub mod zodiac;

use sqlx::PgPool;
use std::sync::Arc;

use config::Config;
use interpretation::Interpreter;
use middleware::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiter>,
    pub interpreter: Arc<Interpreter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let interpreter = Arc::new(Interpreter::new(config.llm.clone()));
        Self {
            db,
            config: Arc::new(config),
            rate_limiter,
            interpreter,
        }
    }
}
