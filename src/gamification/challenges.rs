//! Daily and weekly challenges.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::Action;
use crate::models::{Challenge, ChallengeStatus, CHALLENGE_COLUMNS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePeriod {
    Daily,
    Weekly,
}

impl ChallengePeriod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    /// First and last day (inclusive) of the period containing `today`.
    /// Weeks run Monday to Sunday.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Daily => (today, today),
            Self::Weekly => {
                let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                (start, start + Duration::days(6))
            }
        }
    }
}

/// A challenge completed by the current action.
#[derive(Debug, Clone)]
pub struct Completed {
    pub code: String,
    pub xp_reward: i32,
    pub credit_reward: i32,
}

pub async fn active_for_action(conn: &mut PgConnection, action: Action) -> Result<Vec<Challenge>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM challenges WHERE is_active AND action = $1 ORDER BY id",
        CHALLENGE_COLUMNS
    );
    sqlx::query_as::<_, Challenge>(&query)
        .bind(action.as_str())
        .fetch_all(conn)
        .await
}

/// Add `count` to every matching challenge in its current period.
pub async fn advance(
    conn: &mut PgConnection,
    user_id: Uuid,
    action: Action,
    count: i32,
    today: NaiveDate,
) -> Result<Vec<Completed>, sqlx::Error> {
    let mut completed = Vec::new();
    if count <= 0 {
        return Ok(completed);
    }

    for challenge in active_for_action(&mut *conn, action).await? {
        let Some(period) = ChallengePeriod::from_str(&challenge.period) else {
            tracing::warn!(code = %challenge.code, period = %challenge.period, "Unknown challenge period");
            continue;
        };
        let (period_start, _) = period.bounds(today);

        // Rows already completed are left alone and return nothing
        let progress = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO user_challenge_progress (user_id, challenge_id, period_start, progress)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, challenge_id, period_start) DO UPDATE
            SET progress = user_challenge_progress.progress + EXCLUDED.progress
            WHERE user_challenge_progress.completed_at IS NULL
            RETURNING progress
            "#,
        )
        .bind(user_id)
        .bind(challenge.id)
        .bind(period_start)
        .bind(count)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(progress) = progress else { continue };
        if progress < challenge.target {
            continue;
        }

        sqlx::query(
            r#"
            UPDATE user_challenge_progress
            SET completed_at = NOW(), progress = $4
            WHERE user_id = $1 AND challenge_id = $2 AND period_start = $3
            "#,
        )
        .bind(user_id)
        .bind(challenge.id)
        .bind(period_start)
        .bind(challenge.target)
        .execute(&mut *conn)
        .await?;

        tracing::info!(user_id = %user_id, code = %challenge.code, "Challenge completed");
        completed.push(Completed {
            code: challenge.code,
            xp_reward: challenge.xp_reward,
            credit_reward: challenge.credit_reward,
        });
    }

    Ok(completed)
}

/// Active challenges with the user's progress for the period containing `today`.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid, today: NaiveDate) -> Result<Vec<ChallengeStatus>, sqlx::Error> {
    let query = format!("SELECT {} FROM challenges WHERE is_active ORDER BY period, id", CHALLENGE_COLUMNS);
    let challenges = sqlx::query_as::<_, Challenge>(&query).fetch_all(pool).await?;

    let mut statuses = Vec::with_capacity(challenges.len());
    for challenge in challenges {
        let Some(period) = ChallengePeriod::from_str(&challenge.period) else {
            continue;
        };
        let (period_start, period_end) = period.bounds(today);

        let row: Option<(i32, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT progress, completed_at
            FROM user_challenge_progress
            WHERE user_id = $1 AND challenge_id = $2 AND period_start = $3
            "#,
        )
        .bind(user_id)
        .bind(challenge.id)
        .bind(period_start)
        .fetch_optional(pool)
        .await?;

        let (progress, completed_at) = row.unwrap_or((0, None));
        statuses.push(ChallengeStatus {
            challenge,
            period_start,
            period_end,
            progress,
            completed_at,
        });
    }

    Ok(statuses)
}
