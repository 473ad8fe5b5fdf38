use arcana::config::Config;
use arcana::handlers::create_router;
use arcana::middleware::auth::create_session_token;
use arcana::AppState;
use axum::body::Body;
use axum::http::Response;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

/// Database URL for tests that need a real PostgreSQL.
#[allow(dead_code)]
pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Skip test with message if no test database is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        if crate::common::database_url().is_none() {
            eprintln!("⚠️  Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// A pool that never connects until used. Routes rejected before any query work against it.
#[allow(dead_code)]
pub fn offline_pool(config: &Config) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy(&config.database_url)
        .expect("lazy pool")
}

/// Create a test app with an offline database.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, AppState) {
    let config = Config::test_default();
    let pool = offline_pool(&config);
    let state = AppState::new(pool, config);
    (create_router(state.clone()), state)
}

/// Create a test app against TEST_DATABASE_URL with migrations applied and the deck synced.
#[allow(dead_code)]
pub async fn create_database_app() -> (axum::Router, AppState) {
    let url = database_url().expect("TEST_DATABASE_URL");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    arcana::database::run_migrations(&pool).await.expect("migrations");
    arcana::deck::sync(&pool).await.expect("deck sync");

    let mut config = Config::test_default();
    config.database_url = url;
    let state = AppState::new(pool, config);
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn token_for(state: &AppState, user_id: Uuid, email: Option<&str>) -> String {
    create_session_token(user_id, email, &state.config.session_secret, 3600).expect("token")
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}
