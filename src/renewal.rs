//! Renewal of credit-funded subscriptions.
//!
//! Run once a day. Each due subscription is handled in its own transaction:
//! it is either renewed (credits debited, period advanced one month), marked
//! `credits_exhausted`, or expired when cancellation was requested.

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::ledger::{self, LedgerError};
use crate::models::{Subscription, SubscriptionStatus, TransactionType, SUBSCRIPTION_COLUMNS};

/// Subscriptions ending within this horizon are renewed now.
pub const RENEWAL_HORIZON_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalDecision {
    Renew {
        cost: i32,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    },
    Exhausted,
    Expire,
}

/// Decide what happens to a due subscription given the user's balance.
pub fn plan(subscription: &Subscription, balance: i32) -> RenewalDecision {
    if subscription.cancel_at_period_end {
        return RenewalDecision::Expire;
    }
    if balance < subscription.credit_cost {
        return RenewalDecision::Exhausted;
    }
    let period_start = subscription.current_period_end;
    match period_start.checked_add_months(Months::new(1)) {
        Some(period_end) => RenewalDecision::Renew {
            cost: subscription.credit_cost,
            period_start,
            period_end,
        },
        None => RenewalDecision::Expire,
    }
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct RenewalReport {
    pub processed: usize,
    pub renewed: usize,
    pub exhausted: usize,
    pub expired: usize,
    pub failed: usize,
    /// Rows renewed or paused by a concurrent run between the scan and the lock.
    pub skipped: usize,
}

fn renewal_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(RENEWAL_HORIZON_HOURS)
}

pub async fn due_subscriptions(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Subscription>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {}
        FROM subscriptions
        WHERE payment_method = 'credits'
          AND status = 'active'
          AND current_period_end <= $1
        ORDER BY current_period_end ASC
        "#,
        SUBSCRIPTION_COLUMNS
    );

    sqlx::query_as::<_, Subscription>(&query)
        .bind(renewal_cutoff(now))
        .fetch_all(pool)
        .await
}

/// Renew every due subscription. A failing row is logged and counted, never fatal.
pub async fn run(pool: &PgPool, now: DateTime<Utc>) -> Result<RenewalReport, sqlx::Error> {
    let due = due_subscriptions(pool, now).await?;
    let mut report = RenewalReport::default();

    tracing::info!("🔁 Renewing {} credit subscriptions", due.len());

    for subscription in &due {
        match renew_one(pool, subscription, now).await {
            Ok(None) => {
                report.skipped += 1;
                continue;
            }
            Ok(Some(RenewalDecision::Renew { .. })) => report.renewed += 1,
            Ok(Some(RenewalDecision::Exhausted)) => report.exhausted += 1,
            Ok(Some(RenewalDecision::Expire)) => report.expired += 1,
            Err(e) => {
                tracing::error!(
                    subscription_id = %subscription.id,
                    user_id = %subscription.user_id,
                    "Failed to renew subscription: {}",
                    e
                );
                report.failed += 1;
            }
        }
        report.processed += 1;
    }

    tracing::info!(
        processed = report.processed,
        renewed = report.renewed,
        exhausted = report.exhausted,
        expired = report.expired,
        failed = report.failed,
        skipped = report.skipped,
        "Subscription renewal finished"
    );

    Ok(report)
}

/// Handle one scanned subscription. The row is re-read under lock, so a row
/// already renewed, cancelled or paused since the scan yields `None`.
async fn renew_one(
    pool: &PgPool,
    scanned: &Subscription,
    now: DateTime<Utc>,
) -> Result<Option<RenewalDecision>, LedgerError> {
    let mut tx = pool.begin().await?;

    let query = format!(
        r#"
        SELECT {}
        FROM subscriptions
        WHERE id = $1
          AND payment_method = 'credits'
          AND status = 'active'
          AND current_period_end <= $2
        FOR UPDATE
        "#,
        SUBSCRIPTION_COLUMNS
    );
    let Some(subscription) = sqlx::query_as::<_, Subscription>(&query)
        .bind(scanned.id)
        .bind(renewal_cutoff(now))
        .fetch_optional(&mut *tx)
        .await?
    else {
        tracing::debug!(subscription_id = %scanned.id, "Subscription no longer due, skipping");
        return Ok(None);
    };

    let balance = sqlx::query_scalar::<_, i32>("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
        .bind(subscription.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::UserNotFound(subscription.user_id))?;

    let decision = plan(&subscription, balance);

    match &decision {
        RenewalDecision::Renew { cost, period_start, period_end } => {
            ledger::apply(
                &mut *tx,
                subscription.user_id,
                -cost,
                TransactionType::Subscription,
                &format!("Subscription renewal: {}", subscription.plan),
                None,
            )
            .await?;

            sqlx::query(
                r#"
                UPDATE subscriptions
                SET current_period_start = $2, current_period_end = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(subscription.id)
            .bind(period_start)
            .bind(period_end)
            .execute(&mut *tx)
            .await?;
        }
        RenewalDecision::Exhausted => {
            set_status(&mut *tx, &subscription, SubscriptionStatus::CreditsExhausted).await?;
            tracing::info!(
                user_id = %subscription.user_id,
                balance,
                cost = subscription.credit_cost,
                "Subscription paused: not enough credits"
            );
        }
        RenewalDecision::Expire => {
            set_status(&mut *tx, &subscription, SubscriptionStatus::Expired).await?;
        }
    }

    tx.commit().await?;
    Ok(Some(decision))
}

async fn set_status(
    conn: &mut sqlx::PgConnection,
    subscription: &Subscription,
    status: SubscriptionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(subscription.id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
