use axum::{extract::State, response::Json, routing::post, Router};
use chrono::Utc;

use crate::errors::{AppError, Result};
use crate::renewal::{self, RenewalReport};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/cron/renew-subscriptions", post(renew_subscriptions))
}

async fn renew_subscriptions(State(state): State<AppState>) -> Result<Json<RenewalReport>> {
    let report = renewal::run(&state.db, Utc::now()).await.map_err(|e| {
        tracing::error!("Failed to load due subscriptions: {}", e);
        AppError::DatabaseError("Failed to run subscription renewal".to_string())
    })?;
    Ok(Json(report))
}
