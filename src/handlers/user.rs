use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Extension, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::gamification::{collection, levels::LevelInfo, streaks, streaks::StreakInfo};
use crate::handlers::subscription::find_for_user;
use crate::middleware::{auth::SESSION_COOKIE, AuthUser};
use crate::models::{
    CreditsResponse, ProfileResponse, ProgressResponse, UpdateProfileRequest, User, UserProfile, DEFAULT_LOCALE,
    USER_COLUMNS,
};
use crate::{ledger, pricing, referrals, zodiac::ZodiacSign, AppState};

const REFERRAL_CODE_ATTEMPTS: usize = 5;
const RECENT_TRANSACTIONS: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user", delete(delete_account))
        .route("/api/user/bootstrap", post(bootstrap))
        .route("/api/user/credits", get(get_credits))
        .route("/api/user/profile", get(get_profile).put(update_profile))
        .route("/api/user/progress", get(get_progress))
}

pub(crate) async fn find_user(pool: &PgPool, user_id: Uuid) -> std::result::Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// The session's user row, 404 until the account has been bootstrapped.
pub(crate) async fn load_user(pool: &PgPool, user_id: Uuid) -> Result<User> {
    find_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub(crate) async fn load_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT user_id, birth_date, birth_time, birth_place, zodiac_sign, locale, notification_time, updated_at
        FROM user_profiles
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

/// Create the user row for a new session. Calling it again returns the existing user.
async fn bootstrap(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> Result<Json<User>> {
    if let Some(user) = find_user(&state.db, auth.user_id).await? {
        return Ok(Json(user));
    }

    let email = auth
        .email
        .clone()
        .ok_or_else(|| AppError::BadRequest("Session has no email claim".to_string()))?;

    let query = format!(
        r#"
        INSERT INTO users (id, email, display_name, free_readings_remaining, referral_code)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        RETURNING {}
        "#,
        USER_COLUMNS
    );

    for _ in 0..REFERRAL_CODE_ATTEMPTS {
        let code = referrals::generate_code(&mut rand::thread_rng());

        let inserted = sqlx::query_as::<_, User>(&query)
            .bind(auth.user_id)
            .bind(&email)
            .bind(&auth.name)
            .bind(pricing::FREE_READINGS_ON_SIGNUP)
            .bind(&code)
            .fetch_optional(&state.db)
            .await;

        match inserted {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, "✨ New user provisioned");
                return Ok(Json(user));
            }
            // Lost a race with a concurrent bootstrap
            Ok(None) => return Ok(Json(load_user(&state.db, auth.user_id).await?)),
            Err(sqlx::Error::Database(db_err)) if db_err.constraint() == Some("users_referral_code_key") => {
                tracing::warn!("Referral code collision, retrying");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::DatabaseError("Could not allocate a referral code".to_string()))
}

async fn get_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<CreditsResponse>> {
    let user = load_user(&state.db, auth.user_id).await?;
    let subscription = find_for_user(&state.db, user.id).await?;
    let recent_transactions = ledger::recent(&state.db, user.id, RECENT_TRANSACTIONS).await?;

    Ok(Json(CreditsResponse {
        credits: user.credits,
        free_readings_remaining: user.free_readings_remaining,
        has_active_subscription: subscription.is_some_and(|s| s.is_active_at(Utc::now())),
        recent_transactions,
    }))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let user = load_user(&state.db, auth.user_id).await?;
    let profile = load_profile(&state.db, user.id).await?;

    Ok(Json(ProfileResponse {
        email: user.email,
        display_name: user.display_name,
        referral_code: user.referral_code,
        profile,
    }))
}

/// Upsert the profile. Omitted fields keep their stored value.
async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Validation error: {}", e)))?;

    let zodiac_sign = payload
        .birth_date
        .map(|date| ZodiacSign::from_birth_date(date).as_str());

    let mut tx = state.db.begin().await?;

    let user_query = format!(
        "UPDATE users SET display_name = COALESCE($2, display_name), updated_at = NOW() WHERE id = $1 RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&user_query)
        .bind(auth.user_id)
        .bind(payload.display_name.as_deref().map(str::trim))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let profile = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO user_profiles (user_id, birth_date, birth_time, birth_place, zodiac_sign, locale, notification_time)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, $8), $7)
        ON CONFLICT (user_id) DO UPDATE SET
            birth_date = COALESCE(EXCLUDED.birth_date, user_profiles.birth_date),
            birth_time = COALESCE(EXCLUDED.birth_time, user_profiles.birth_time),
            birth_place = COALESCE(EXCLUDED.birth_place, user_profiles.birth_place),
            zodiac_sign = COALESCE(EXCLUDED.zodiac_sign, user_profiles.zodiac_sign),
            locale = COALESCE($6, user_profiles.locale),
            notification_time = COALESCE(EXCLUDED.notification_time, user_profiles.notification_time),
            updated_at = NOW()
        RETURNING user_id, birth_date, birth_time, birth_place, zodiac_sign, locale, notification_time, updated_at
        "#,
    )
    .bind(user.id)
    .bind(payload.birth_date)
    .bind(payload.birth_time)
    .bind(payload.birth_place.as_deref().map(str::trim))
    .bind(zodiac_sign)
    .bind(payload.locale.as_deref())
    .bind(payload.notification_time)
    .bind(DEFAULT_LOCALE)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(ProfileResponse {
        email: user.email,
        display_name: user.display_name,
        referral_code: user.referral_code,
        profile: Some(profile),
    }))
}

/// Delete the account and everything hanging off it, then end the session.
async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, "🗑️ Account deleted");
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn get_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ProgressResponse>> {
    let user = load_user(&state.db, auth.user_id).await?;
    let cards_collected = collection::count(&state.db, user.id).await?;
    let today = Utc::now().date_naive();
    let current_streak = streaks::effective(user.last_daily_reading_on, user.current_streak, today);

    Ok(Json(ProgressResponse {
        level: LevelInfo::for_xp(user.xp),
        streak: StreakInfo::new(current_streak, user.longest_streak),
        total_readings: user.total_readings,
        cards_collected,
    }))
}
