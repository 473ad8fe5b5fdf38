use axum::{extract::State, response::Json, routing::get, Extension, Router};
use chrono::Utc;

use crate::errors::Result;
use crate::gamification::{achievements, challenges, collection};
use crate::middleware::AuthUser;
use crate::models::{AchievementsResponse, ChallengeStatus, CollectionResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/achievements", get(list_achievements))
        .route("/api/challenges", get(list_challenges))
        .route("/api/collection", get(get_collection))
}

async fn list_achievements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<AchievementsResponse>> {
    let achievements = achievements::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(AchievementsResponse {
        unlocked: achievements.iter().filter(|a| a.unlocked_at.is_some()).count(),
        total: achievements.len(),
        achievements,
    }))
}

async fn list_challenges(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ChallengeStatus>>> {
    let today = Utc::now().date_naive();
    Ok(Json(challenges::list_for_user(&state.db, auth.user_id, today).await?))
}

async fn get_collection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<CollectionResponse>> {
    Ok(Json(collection::for_user(&state.db, auth.user_id).await?))
}
