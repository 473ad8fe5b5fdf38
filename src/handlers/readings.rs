use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::gamification::{self, collection, Action};
use crate::handlers::{
    subscription::find_for_user,
    user::{load_profile, load_user},
};
use crate::interpretation::ReadingContext;
use crate::middleware::AuthUser;
use crate::models::{
    Card, CreateReadingRequest, DrawnCard, PublicReading, Reading, ReadingHistoryParams, ReadingHistoryResponse,
    ReadingResponse, ShareRequest, ShareResponse, TransactionType, CARD_COLUMNS, DEFAULT_LOCALE, READING_COLUMNS,
};
use crate::pricing::{self, ReadingCharge};
use crate::{deck, ledger, zodiac::ZodiacSign, AppState};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/readings", get(list_readings).post(create_reading))
        .route("/api/readings/:id", get(get_reading))
        .route("/api/readings/:id/share", put(share_reading))
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/shared/readings/:id", get(get_shared_reading))
}

/// Page and page size after applying defaults and bounds.
pub fn page_bounds(params: &ReadingHistoryParams) -> (i64, i64) {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

async fn create_reading(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateReadingRequest>,
) -> Result<Json<ReadingResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Validation error: {}", e)))?;

    let user = load_user(&state.db, auth.user_id).await?;
    let profile = load_profile(&state.db, user.id).await?;
    let now = Utc::now();

    // Reject before calling the interpretation provider; the charge is re-checked under lock below
    let has_subscription = find_for_user(&state.db, user.id)
        .await?
        .is_some_and(|s| s.is_active_at(now));
    let charge = pricing::charge_for(payload.spread, user.free_readings_remaining, has_subscription);
    ledger::check_debit(user.credits, charge.credits())?;

    let locale = payload
        .locale
        .clone()
        .or_else(|| profile.as_ref().map(|p| p.locale.clone()))
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
    let zodiac = profile
        .as_ref()
        .and_then(|p| p.zodiac_sign.as_deref())
        .and_then(ZodiacSign::from_str);
    let question = payload
        .question
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    let cards = deck::draw(&mut rand::thread_rng(), payload.spread);
    let interpretation = state
        .interpreter
        .interpret(&ReadingContext {
            spread: payload.spread,
            question: question.as_deref(),
            cards: &cards,
            locale: &locale,
            zodiac,
        })
        .await;

    let mut tx = state.db.begin().await?;

    let free_remaining = sqlx::query_scalar::<_, i32>("SELECT free_readings_remaining FROM users WHERE id = $1 FOR UPDATE")
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;
    let has_subscription = find_for_user(&mut *tx, user.id)
        .await?
        .is_some_and(|s| s.is_active_at(now));
    let charge = pricing::charge_for(payload.spread, free_remaining, has_subscription);

    match charge {
        ReadingCharge::Subscription => {}
        ReadingCharge::FreeReading => {
            sqlx::query("UPDATE users SET free_readings_remaining = free_readings_remaining - 1 WHERE id = $1")
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
        }
        ReadingCharge::Credits(cost) => {
            ledger::apply(
                &mut *tx,
                user.id,
                -cost,
                TransactionType::Reading,
                &format!("Reading: {}", payload.spread.as_str()),
                None,
            )
            .await?;
        }
    }

    sqlx::query("UPDATE users SET total_readings = total_readings + 1, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    let insert = format!(
        r#"
        INSERT INTO readings (id, user_id, spread, question, locale, cards, interpretation, charge, credits_spent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        READING_COLUMNS
    );
    let reading = sqlx::query_as::<_, Reading>(&insert)
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(payload.spread.as_str())
        .bind(&question)
        .bind(&locale)
        .bind(SqlJson(&cards))
        .bind(&interpretation)
        .bind(charge.as_str())
        .bind(charge.credits())
        .fetch_one(&mut *tx)
        .await?;

    let card_ids: Vec<i32> = cards.iter().map(|c| c.card_id).collect();
    let discovered = collection::record_draws(&mut *tx, user.id, &card_ids).await?;

    let mut actions = vec![(Action::Reading, 1)];
    if !discovered.is_empty() {
        actions.push((Action::Discover, discovered.len() as i32));
    }
    let outcome = gamification::record_action(&mut *tx, user.id, &actions, now.date_naive()).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        spread = payload.spread.as_str(),
        charge = charge.as_str(),
        "🔮 Reading created"
    );

    Ok(Json(ReadingResponse {
        reading,
        gamification: outcome,
    }))
}

async fn list_readings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ReadingHistoryParams>,
) -> Result<Json<ReadingHistoryResponse>> {
    let (page, limit) = page_bounds(&params);

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings WHERE user_id = $1")
        .bind(auth.user_id)
        .fetch_one(&state.db)
        .await?;

    let query = format!(
        r#"
        SELECT {}
        FROM readings
        WHERE user_id = $1
        ORDER BY created_at DESC, id
        LIMIT $2 OFFSET $3
        "#,
        READING_COLUMNS
    );
    let readings = sqlx::query_as::<_, Reading>(&query)
        .bind(auth.user_id)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(ReadingHistoryResponse {
        readings,
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    }))
}

async fn find_reading(state: &AppState, id: Uuid) -> Result<Reading> {
    let query = format!("SELECT {} FROM readings WHERE id = $1", READING_COLUMNS);
    sqlx::query_as::<_, Reading>(&query)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reading not found".to_string()))
}

async fn get_reading(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reading>> {
    let reading = find_reading(&state, id).await?;
    if reading.user_id != auth.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(Json(reading))
}

/// Toggle public sharing. The first time a reading is shared counts as a share action.
async fn share_reading(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareRequest>,
) -> Result<Json<ShareResponse>> {
    let mut tx = state.db.begin().await?;

    let row: Option<(Uuid, Option<DateTime<Utc>>)> =
        sqlx::query_as("SELECT user_id, shared_at FROM readings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let (owner, shared_at) = row.ok_or_else(|| AppError::NotFound("Reading not found".to_string()))?;
    if owner != auth.user_id {
        return Err(AppError::Forbidden);
    }

    sqlx::query(
        r#"
        UPDATE readings
        SET is_shared = $2, shared_at = CASE WHEN $2 THEN COALESCE(shared_at, NOW()) ELSE shared_at END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(payload.shared)
    .execute(&mut *tx)
    .await?;

    let gamification = if payload.shared && shared_at.is_none() {
        let today = Utc::now().date_naive();
        Some(gamification::record_action(&mut *tx, auth.user_id, &[(Action::Share, 1)], today).await?)
    } else {
        None
    };

    tx.commit().await?;

    Ok(Json(ShareResponse {
        is_shared: payload.shared,
        gamification,
    }))
}

async fn get_shared_reading(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<PublicReading>> {
    let reading = find_reading(&state, id).await?;
    if !reading.is_shared {
        return Err(AppError::NotFound("Reading not found".to_string()));
    }

    let ids: Vec<i32> = reading.cards.iter().map(|c: &DrawnCard| c.card_id).collect();
    let query = format!("SELECT {} FROM cards WHERE id = ANY($1) ORDER BY id", CARD_COLUMNS);
    let card_details = sqlx::query_as::<_, Card>(&query)
        .bind(&ids)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(PublicReading::new(reading, card_details)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_apply_defaults_and_limits() {
        let params = ReadingHistoryParams { page: None, limit: None };
        assert_eq!(page_bounds(&params), (1, DEFAULT_PAGE_SIZE));

        let params = ReadingHistoryParams { page: Some(0), limit: Some(500) };
        assert_eq!(page_bounds(&params), (1, MAX_PAGE_SIZE));

        let params = ReadingHistoryParams { page: Some(3), limit: Some(0) };
        assert_eq!(page_bounds(&params), (3, 1));
    }
}
