pub mod catalog;
pub mod cron;
pub mod daily;
pub mod gamification;
pub mod health;
pub mod locale;
pub mod readings;
pub mod referrals;
pub mod subscription;
pub mod user;

use axum::{http::HeaderValue, middleware::from_fn_with_state, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::Config,
    middleware::{rate_limit_middleware, require_auth, require_cron_secret},
    AppState,
};

/// Build the complete application router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // No session required
    let public_routes = Router::new()
        .merge(health::router())
        .merge(catalog::router())
        .merge(readings::public_router())
        .merge(locale::router());

    // Session cookie or bearer token
    let protected_routes = Router::new()
        .merge(user::router())
        .merge(subscription::router())
        .merge(readings::router())
        .merge(daily::router())
        .merge(gamification::router())
        .merge(referrals::router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // Scheduler only
    let cron_routes = cron::router().route_layer(from_fn_with_state(state.clone(), require_cron_secret));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(cron_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = if config.debug_mode {
        info!("🔓 Development mode: Using permissive CORS");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false) // Can't use credentials with allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("⚠️ Ignoring invalid origin '{}': {}", origin, e);
                    None
                }
            })
            .collect();

        info!("🔒 Production mode: CORS configured for {} origins", origins.len());
        for origin in &origins {
            info!("  - Allowed origin: {:?}", origin);
        }
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
    };

    cors.allow_methods([
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::PUT,
        axum::http::Method::DELETE,
        axum::http::Method::OPTIONS,
    ])
    .allow_headers([
        axum::http::header::CONTENT_TYPE,
        axum::http::header::AUTHORIZATION,
        axum::http::header::ACCEPT,
        axum::http::header::ORIGIN,
    ])
}
