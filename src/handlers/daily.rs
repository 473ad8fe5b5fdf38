use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::gamification::{self, collection, streaks, Action};
use crate::handlers::user::{load_profile, load_user};
use crate::interpretation::ReadingContext;
use crate::middleware::AuthUser;
use crate::models::{
    Card, DailyReading, DailyReadingResponse, ShareRequest, ShareResponse, Spread, TransactionType, CARD_COLUMNS,
    DAILY_READING_COLUMNS, DEFAULT_LOCALE,
};
use crate::{deck, ledger, zodiac::ZodiacSign, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/daily-reading", get(get_daily_reading))
        .route("/api/daily-reading/:date/share", put(share_daily_reading))
}

async fn find_daily(state: &AppState, user_id: Uuid, date: NaiveDate) -> Result<Option<DailyReading>> {
    let query = format!(
        "SELECT {} FROM daily_readings WHERE user_id = $1 AND reading_date = $2",
        DAILY_READING_COLUMNS
    );
    let reading = sqlx::query_as::<_, DailyReading>(&query)
        .bind(user_id)
        .bind(date)
        .fetch_optional(&state.db)
        .await?;
    Ok(reading)
}

async fn load_card(state: &AppState, id: i32) -> Result<Card> {
    let query = format!("SELECT {} FROM cards WHERE id = $1", CARD_COLUMNS);
    sqlx::query_as::<_, Card>(&query)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::DatabaseError(format!("Card {} missing from deck", id)))
}

/// Today's card. Drawn on the first request of the day, returned as-is afterwards.
async fn get_daily_reading(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DailyReadingResponse>> {
    let today = Utc::now().date_naive();

    if let Some(reading) = find_daily(&state, auth.user_id, today).await? {
        return existing_response(&state, reading).await;
    }

    let user = load_user(&state.db, auth.user_id).await?;
    let profile = load_profile(&state.db, user.id).await?;
    let locale = profile
        .as_ref()
        .map(|p| p.locale.clone())
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
    let zodiac = profile
        .as_ref()
        .and_then(|p| p.zodiac_sign.as_deref())
        .and_then(ZodiacSign::from_str);

    let drawn = deck::draw(&mut rand::thread_rng(), Spread::OneCard);
    let interpretation = state
        .interpreter
        .interpret(&ReadingContext {
            spread: Spread::OneCard,
            question: None,
            cards: &drawn,
            locale: &locale,
            zodiac,
        })
        .await;
    let Some(card) = drawn.first() else {
        return Err(AppError::Internal(anyhow::anyhow!("Empty draw for daily reading")));
    };

    let mut tx = state.db.begin().await?;

    let (current_streak, longest_streak, last_reading): (i32, i32, Option<NaiveDate>) = sqlx::query_as(
        "SELECT current_streak, longest_streak, last_daily_reading_on FROM users WHERE id = $1 FOR UPDATE",
    )
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    let insert = format!(
        r#"
        INSERT INTO daily_readings (id, user_id, reading_date, card_id, reversed, interpretation)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, reading_date) DO NOTHING
        RETURNING {}
        "#,
        DAILY_READING_COLUMNS
    );
    let inserted = sqlx::query_as::<_, DailyReading>(&insert)
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(today)
        .bind(card.card_id)
        .bind(card.reversed)
        .bind(&interpretation)
        .fetch_optional(&mut *tx)
        .await?;

    // A concurrent request created today's reading first
    let Some(reading) = inserted else {
        tx.rollback().await?;
        let reading = find_daily(&state, user.id, today)
            .await?
            .ok_or_else(|| AppError::DatabaseError("Daily reading vanished".to_string()))?;
        return existing_response(&state, reading).await;
    };

    let streak = streaks::advance(last_reading, current_streak, today);
    sqlx::query(
        r#"
        UPDATE users
        SET current_streak = $2, longest_streak = $3, last_daily_reading_on = $4, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(streak)
    .bind(longest_streak.max(streak))
    .bind(today)
    .execute(&mut *tx)
    .await?;

    let mut milestone_credits = 0;
    if let Some(milestone) = streaks::milestone_at(streak) {
        ledger::apply(
            &mut *tx,
            user.id,
            milestone.reward_credits,
            TransactionType::Bonus,
            &format!("{}-day streak", milestone.days),
            None,
        )
        .await?;
        milestone_credits = milestone.reward_credits;
        tracing::info!(user_id = %user.id, days = milestone.days, "🔥 Streak milestone reached");
    }

    let discovered = collection::record_draws(&mut *tx, user.id, &[card.card_id]).await?;
    let mut actions = vec![(Action::DailyReading, 1)];
    if !discovered.is_empty() {
        actions.push((Action::Discover, discovered.len() as i32));
    }
    let outcome = gamification::record_action(&mut *tx, user.id, &actions, today).await?;

    tx.commit().await?;

    let card = load_card(&state, reading.card_id).await?;
    Ok(Json(DailyReadingResponse {
        reading,
        card,
        streak,
        is_new: true,
        milestone_credits,
        gamification: Some(outcome),
    }))
}

async fn existing_response(state: &AppState, reading: DailyReading) -> Result<Json<DailyReadingResponse>> {
    let card = load_card(state, reading.card_id).await?;
    let streak = sqlx::query_scalar::<_, i32>("SELECT current_streak FROM users WHERE id = $1")
        .bind(reading.user_id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(DailyReadingResponse {
        reading,
        card,
        streak,
        is_new: false,
        milestone_credits: 0,
        gamification: None,
    }))
}

async fn share_daily_reading(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(date): Path<NaiveDate>,
    Json(payload): Json<ShareRequest>,
) -> Result<Json<ShareResponse>> {
    let mut tx = state.db.begin().await?;

    let shared_at: Option<DateTime<Utc>> = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT shared_at FROM daily_readings WHERE user_id = $1 AND reading_date = $2 FOR UPDATE",
    )
    .bind(auth.user_id)
    .bind(date)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Daily reading not found".to_string()))?;

    sqlx::query(
        r#"
        UPDATE daily_readings
        SET is_shared = $3, shared_at = CASE WHEN $3 THEN COALESCE(shared_at, NOW()) ELSE shared_at END
        WHERE user_id = $1 AND reading_date = $2
        "#,
    )
    .bind(auth.user_id)
    .bind(date)
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
