use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, Months, Utc};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{
    PaymentMethod, SubscribeRequest, Subscription, SubscriptionResponse, SubscriptionStatus, TransactionType,
    SUBSCRIPTION_COLUMNS,
};
use crate::{ledger, pricing, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user/subscription", get(get_subscription).post(subscribe))
        .route("/api/user/subscription/cancel", post(cancel_subscription))
}

pub(crate) async fn find_for_user<'e, E>(executor: E, user_id: Uuid) -> std::result::Result<Option<Subscription>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let query = format!("SELECT {} FROM subscriptions WHERE user_id = $1", SUBSCRIPTION_COLUMNS);
    sqlx::query_as::<_, Subscription>(&query)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

fn response(subscription: Option<Subscription>, now: DateTime<Utc>) -> SubscriptionResponse {
    SubscriptionResponse {
        is_active: subscription.as_ref().is_some_and(|s| s.is_active_at(now)),
        subscription,
    }
}

async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<SubscriptionResponse>> {
    let subscription = find_for_user(&state.db, auth.user_id).await?;
    Ok(Json(response(subscription, Utc::now())))
}

/// Start a credit-funded subscription. The first month is debited immediately.
async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Json<SubscriptionResponse>> {
    let plan = pricing::find_plan(payload.plan.trim())
        .ok_or_else(|| AppError::BadRequest(format!("Unknown plan: {}", payload.plan)))?;
    let now = Utc::now();

    let mut tx = state.db.begin().await?;

    let existing_query = format!(
        "SELECT {} FROM subscriptions WHERE user_id = $1 FOR UPDATE",
        SUBSCRIPTION_COLUMNS
    );
    let existing = sqlx::query_as::<_, Subscription>(&existing_query)
        .bind(auth.user_id)
        .fetch_optional(&mut *tx)
        .await?;

    if existing.as_ref().is_some_and(|s| s.is_active_at(now)) {
        return Err(AppError::BadRequest("You already have an active subscription".to_string()));
    }

    ledger::apply(
        &mut *tx,
        auth.user_id,
        -plan.credit_cost,
        TransactionType::Subscription,
        &format!("Subscription: {}", plan.id),
        None,
    )
    .await?;

    let period_end = now
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Subscription period overflow")))?;

    let upsert = format!(
        r#"
        INSERT INTO subscriptions
            (id, user_id, plan, payment_method, status, credit_cost, current_period_start, current_period_end, cancel_at_period_end)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
        ON CONFLICT (user_id) DO UPDATE SET
            plan = EXCLUDED.plan,
            payment_method = EXCLUDED.payment_method,
            status = EXCLUDED.status,
            credit_cost = EXCLUDED.credit_cost,
            current_period_start = EXCLUDED.current_period_start,
            current_period_end = EXCLUDED.current_period_end,
            cancel_at_period_end = FALSE,
            updated_at = NOW()
        RETURNING {}
        "#,
        SUBSCRIPTION_COLUMNS
    );
    let subscription = sqlx::query_as::<_, Subscription>(&upsert)
        .bind(Uuid::new_v4())
        .bind(auth.user_id)
        .bind(plan.id)
        .bind(PaymentMethod::Credits.as_str())
        .bind(SubscriptionStatus::Active.as_str())
        .bind(plan.credit_cost)
        .bind(now)
        .bind(period_end)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, plan = plan.id, "💳 Subscription started with credits");
    Ok(Json(response(Some(subscription), now)))
}

/// Stop renewing at the end of the current period.
async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<SubscriptionResponse>> {
    let query = format!(
        r#"
        UPDATE subscriptions
        SET cancel_at_period_end = TRUE, updated_at = NOW()
        WHERE user_id = $1 AND status = $2
        RETURNING {}
        "#,
        SUBSCRIPTION_COLUMNS
    );
    let subscription = sqlx::query_as::<_, Subscription>(&query)
        .bind(auth.user_id)
        .bind(SubscriptionStatus::Active.as_str())
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("No active subscription to cancel".to_string()))?;

    tracing::info!(user_id = %auth.user_id, "Subscription set to cancel at period end");
    Ok(Json(response(Some(subscription), Utc::now())))
}
