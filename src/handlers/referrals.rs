use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::RedeemReferralRequest;
use crate::referrals::{self, Redemption, ReferralSummary};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/referrals", get(get_referrals))
        .route("/api/referrals/redeem", post(redeem_code))
}

async fn get_referrals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ReferralSummary>> {
    referrals::summary(&state.db, auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

async fn redeem_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<RedeemReferralRequest>,
) -> Result<Json<Redemption>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Validation error: {}", e)))?;

    Ok(Json(referrals::redeem(&state.db, auth.user_id, &payload.code).await?))
}
