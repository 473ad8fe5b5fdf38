use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arcana::{config::Config, database, deck, handlers, AppState};

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with reduced SQL verbosity
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arcana=info,sqlx=warn,info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = database::create_pool(&config.database_url).await?;
    info!("🔌 Connected to PostgreSQL");

    if config.skip_migrations {
        warn!("⚠️ Skipping migrations due to SKIP_MIGRATIONS=true");
    } else if let Err(e) = database::run_migrations(&pool).await {
        warn!("❌ Failed to run migrations: {}", e);
        warn!("Continuing without migrations (set SKIP_MIGRATIONS=true to suppress this warning)");
    }

    match deck::sync(&pool).await {
        Ok(count) => info!("🃏 Deck synced ({} cards)", count),
        Err(e) => warn!("⚠️ Failed to sync deck: {}", e),
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(pool, config);

    if !state.interpreter.is_configured() {
        warn!("⚠️ LLM_API_KEY not set, interpretations will use built-in templates");
    }

    // Drop expired rate-limit windows
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = limiter.sweep(Instant::now());
            if removed > 0 {
                tracing::debug!("Swept {} expired rate-limit windows", removed);
            }
        }
    });

    let app = handlers::create_router(state);

    info!("🚀 Server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
