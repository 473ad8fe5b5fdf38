//! End-to-end flows against a real PostgreSQL.
//!
//! Run with TEST_DATABASE_URL pointing at a disposable database.

use arcana::{ledger, models::TransactionType, pricing, renewal};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Months, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

mod common;

async fn call(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Bootstrap a fresh user and return its id and session token.
async fn new_user(app: &Router, state: &arcana::AppState) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let email = format!("{}@example.com", id);
    let token = common::token_for(state, id, Some(&email));
    let (status, body) = call(app, "POST", "/api/user/bootstrap", &token, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    (id, token)
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (id, token) = new_user(&app, &state).await;

    let (status, body) = call(&app, "POST", "/api/user/bootstrap", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["free_readings_remaining"], 3);
    assert_eq!(body["referral_code"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn test_free_readings_then_credits() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (id, token) = new_user(&app, &state).await;

    for _ in 0..3 {
        let (status, body) = call(&app, "POST", "/api/readings", &token, Some(json!({ "spread": "one_card" }))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["reading"]["charge"], "free");
    }

    // Out of free readings and credits
    let (status, _) = call(&app, "POST", "/api/readings", &token, Some(json!({ "spread": "celtic_cross" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut conn = state.db.acquire().await.unwrap();
    ledger::apply(&mut *conn, id, 5, TransactionType::Bonus, "test grant", None).await.unwrap();
    drop(conn);

    let (status, body) = call(&app, "POST", "/api/readings", &token, Some(json!({ "spread": "celtic_cross" }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["reading"]["charge"], "credits");
    assert_eq!(body["reading"]["credits_spent"], 3);
    assert_eq!(body["reading"]["cards"].as_array().unwrap().len(), 10);

    // Level-up rewards may land in the same transaction, so look for the debit itself
    let (_, credits) = call(&app, "GET", "/api/user/credits", &token, None).await;
    let transactions = credits["recent_transactions"].as_array().unwrap();
    assert_eq!(credits["credits"], transactions[0]["balance_after"]);
    let debit = transactions
        .iter()
        .find(|t| t["transaction_type"] == "READING")
        .expect("reading debit");
    assert_eq!(debit["amount"], -3);

    let (_, history) = call(&app, "GET", "/api/readings?limit=2", &token, None).await;
    assert_eq!(history["total"], 4);
    assert_eq!(history["total_pages"], 2);
}

#[tokio::test]
async fn test_first_reading_unlocks_achievement_and_collection() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (_, token) = new_user(&app, &state).await;

    let (status, body) = call(&app, "POST", "/api/readings", &token, Some(json!({ "spread": "three_card" }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let unlocked: Vec<&str> = body["gamification"]["achievements_unlocked"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(unlocked.contains(&"FIRST_READING"));

    let (_, collection) = call(&app, "GET", "/api/collection", &token, None).await;
    assert_eq!(collection["discovered"], 3);
    assert_eq!(collection["total"], 78);

    let (_, progress) = call(&app, "GET", "/api/user/progress", &token, None).await;
    assert_eq!(progress["total_readings"], 1);
    assert!(progress["level"]["xp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_reading_owner_and_sharing() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (_, owner) = new_user(&app, &state).await;
    let (_, stranger) = new_user(&app, &state).await;

    let (_, body) = call(&app, "POST", "/api/readings", &owner, Some(json!({ "spread": "one_card" }))).await;
    let id = body["reading"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "GET", &format!("/api/readings/{}", id), &stranger, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "GET", &format!("/api/shared/readings/{}", id), &stranger, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, shared) = call(&app, "PUT", &format!("/api/readings/{}/share", id), &owner, Some(json!({ "shared": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(shared["gamification"].is_object());

    // Sharing again earns nothing
    let (_, again) = call(&app, "PUT", &format!("/api/readings/{}/share", id), &owner, Some(json!({ "shared": true }))).await;
    assert!(again["gamification"].is_null());

    let (status, public) = call(&app, "GET", &format!("/api/shared/readings/{}", id), &stranger, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(public.get("user_id").is_none());
    assert_eq!(public["card_details"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_daily_reading_once_per_day() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (_, token) = new_user(&app, &state).await;

    let (status, first) = call(&app, "GET", "/api/daily-reading", &token, None).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["is_new"], true);
    assert_eq!(first["streak"], 1);

    let (_, second) = call(&app, "GET", "/api/daily-reading", &token, None).await;
    assert_eq!(second["is_new"], false);
    assert_eq!(second["reading"]["id"], first["reading"]["id"]);
}

#[tokio::test]
async fn test_referral_redemption_rules() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (_, referrer) = new_user(&app, &state).await;
    let (_, friend) = new_user(&app, &state).await;

    let (_, summary) = call(&app, "GET", "/api/referrals", &referrer, None).await;
    let code = summary["code"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", "/api/referrals/redeem", &referrer, Some(json!({ "code": code }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, "POST", "/api/referrals/redeem", &friend, Some(json!({ "code": code.to_lowercase() }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["balance"], 2);

    let (status, _) = call(&app, "POST", "/api/referrals/redeem", &friend, Some(json!({ "code": code }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, summary) = call(&app, "GET", "/api/referrals", &referrer, None).await;
    assert_eq!(summary["referral_count"], 1);
    let (_, credits) = call(&app, "GET", "/api/user/credits", &referrer, None).await;
    assert_eq!(credits["credits"], 3);
}

#[tokio::test]
async fn test_subscription_with_credits_and_renewal() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (id, token) = new_user(&app, &state).await;

    let (status, _) = call(&app, "POST", "/api/user/subscription", &token, Some(json!({ "plan": "monthly" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut conn = state.db.acquire().await.unwrap();
    ledger::apply(&mut *conn, id, 10, TransactionType::Bonus, "test grant", None).await.unwrap();
    drop(conn);

    let (status, body) = call(&app, "POST", "/api/user/subscription", &token, Some(json!({ "plan": "monthly" }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["is_active"], true);

    let (status, _) = call(&app, "POST", "/api/user/subscription", &token, Some(json!({ "plan": "monthly" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Make the period due; the balance is now zero so renewal must exhaust it
    sqlx::query("UPDATE subscriptions SET current_period_end = NOW() + INTERVAL '1 hour' WHERE user_id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .unwrap();

    let report = renewal::run(&state.db, Utc::now()).await.unwrap();
    assert!(report.exhausted >= 1);

    let (_, body) = call(&app, "GET", "/api/user/subscription", &token, None).await;
    assert_eq!(body["subscription"]["status"], "credits_exhausted");
    assert_eq!(body["is_active"], false);
}

async fn grant(state: &arcana::AppState, user_id: Uuid, amount: i32) {
    let mut conn = state.db.acquire().await.unwrap();
    ledger::apply(&mut *conn, user_id, amount, TransactionType::Bonus, "test grant", None)
        .await
        .unwrap();
}

/// Subscribe with credits and move the period end into the renewal horizon.
async fn due_subscription(app: &Router, state: &arcana::AppState, user_id: Uuid, token: &str) -> DateTime<Utc> {
    let (status, body) = call(app, "POST", "/api/user/subscription", token, Some(json!({ "plan": "monthly" }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    sqlx::query_scalar::<_, DateTime<Utc>>(
        "UPDATE subscriptions SET current_period_end = NOW() + INTERVAL '1 hour' WHERE user_id = $1 RETURNING current_period_end",
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await
    .unwrap()
}

async fn renewal_debits(state: &arcana::AppState, user_id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1 AND description LIKE 'Subscription renewal%'",
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_renewal_debits_once_and_advances_one_month() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (id, token) = new_user(&app, &state).await;
    grant(&state, id, 100).await;
    let old_end = due_subscription(&app, &state, id, &token).await;

    // Overlapping runs, as with a retried cron call
    let now = Utc::now();
    let (a, b) = tokio::join!(renewal::run(&state.db, now), renewal::run(&state.db, now));
    a.unwrap();
    b.unwrap();

    assert_eq!(renewal_debits(&state, id).await, 1);

    let (_, credits) = call(&app, "GET", "/api/user/credits", &token, None).await;
    assert_eq!(credits["credits"], 80);
    assert_eq!(credits["recent_transactions"][0]["transaction_type"], "SUBSCRIPTION");
    assert_eq!(credits["recent_transactions"][0]["amount"], -10);

    let (start, end): (DateTime<Utc>, DateTime<Utc>) =
        sqlx::query_as("SELECT current_period_start, current_period_end FROM subscriptions WHERE user_id = $1")
            .bind(id)
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(start, old_end);
    assert_eq!(end, old_end.checked_add_months(Months::new(1)).unwrap());

    // The new period is outside the horizon, so a later run leaves it alone
    renewal::run(&state.db, Utc::now()).await.unwrap();
    assert_eq!(renewal_debits(&state, id).await, 1);
}

#[tokio::test]
async fn test_renewal_expires_cancelled_subscription() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (id, token) = new_user(&app, &state).await;
    grant(&state, id, 100).await;
    due_subscription(&app, &state, id, &token).await;

    let (status, _) = call(&app, "POST", "/api/user/subscription/cancel", &token, None).await;
    assert_eq!(status, StatusCode::OK);

    renewal::run(&state.db, Utc::now()).await.unwrap();

    let (_, body) = call(&app, "GET", "/api/user/subscription", &token, None).await;
    assert_eq!(body["subscription"]["status"], "expired");
    assert_eq!(renewal_debits(&state, id).await, 0);

    let (_, credits) = call(&app, "GET", "/api/user/credits", &token, None).await;
    assert_eq!(credits["credits"], 90);
}

#[tokio::test]
async fn test_purchase_reference_is_granted_once() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (id, token) = new_user(&app, &state).await;
    let package = pricing::find_package("starter").unwrap();
    let reference = format!("cs_test_{}", Uuid::new_v4());

    let fulfil = || async {
        let mut tx = state.db.begin().await.unwrap();
        let granted = ledger::grant_purchase(&mut *tx, id, &package, &reference).await.unwrap();
        tx.commit().await.unwrap();
        granted
    };

    // Concurrent webhook deliveries for the same session
    let (first, second) = tokio::join!(fulfil(), fulfil());
    let granted: Vec<i32> = [first, second].into_iter().flatten().collect();
    assert_eq!(granted, vec![package.credits]);

    assert_eq!(fulfil().await, None);

    let rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM credit_transactions WHERE reference = $1")
        .bind(&reference)
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let (_, credits) = call(&app, "GET", "/api/user/credits", &token, None).await;
    assert_eq!(credits["credits"], package.credits);
}

#[tokio::test]
async fn test_users_cannot_refer_each_other() {
    require_database!();
    let (app, state) = common::create_database_app().await;
    let (_, alice) = new_user(&app, &state).await;
    let (_, bob) = new_user(&app, &state).await;

    let (_, summary) = call(&app, "GET", "/api/referrals", &alice, None).await;
    let alice_code = summary["code"].as_str().unwrap().to_string();
    let (_, summary) = call(&app, "GET", "/api/referrals", &bob, None).await;
    let bob_code = summary["code"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", "/api/referrals/redeem", &bob, Some(json!({ "code": alice_code }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "POST", "/api/referrals/redeem", &alice, Some(json!({ "code": bob_code }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (_, credits) = call(&app, "GET", "/api/user/credits", &alice, None).await;
    assert_eq!(credits["credits"], 3);
}
