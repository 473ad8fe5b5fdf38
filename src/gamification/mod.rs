//! XP, levels, streaks, challenges, achievements and the card collection.
//!
//! `record_action` is the single entry point used by handlers. It runs inside
//! the caller's transaction so rewards commit or roll back with the action
//! that earned them.

pub mod achievements;
pub mod challenges;
pub mod collection;
pub mod levels;
pub mod streaks;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::ledger::{self, LedgerError};
use crate::models::TransactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reading,
    DailyReading,
    Discover,
    Share,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "READING",
            Self::DailyReading => "DAILY_READING",
            Self::Discover => "DISCOVER",
            Self::Share => "SHARE",
        }
    }

    pub fn xp(&self) -> i32 {
        match self {
            Self::Reading => 15,
            Self::DailyReading => 10,
            Self::Discover => 5,
            Self::Share => 5,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct GamificationOutcome {
    pub xp_gained: i32,
    pub xp: i32,
    pub level: i32,
    pub levels_gained: Vec<i32>,
    pub credits_awarded: i32,
    pub challenges_completed: Vec<String>,
    pub achievements_unlocked: Vec<String>,
}

/// Add XP and credit the reward of every level crossed.
pub async fn add_xp(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
    outcome: &mut GamificationOutcome,
) -> Result<(), LedgerError> {
    let old_xp = sqlx::query_scalar::<_, i32>("SELECT xp FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::UserNotFound(user_id))?;

    let new_xp = old_xp + amount.max(0);
    let level = levels::level_for(new_xp);

    sqlx::query("UPDATE users SET xp = $2, level = $3, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(new_xp)
        .bind(level.level)
        .execute(&mut *conn)
        .await?;

    for gained in levels::levels_gained(old_xp, new_xp) {
        tracing::info!(user_id = %user_id, level = gained.level, "⬆️ Level up");
        if gained.reward_credits > 0 {
            ledger::apply(
                &mut *conn,
                user_id,
                gained.reward_credits,
                TransactionType::Bonus,
                &format!("Level {} reached: {}", gained.level, gained.name_en),
                None,
            )
            .await?;
            outcome.credits_awarded += gained.reward_credits;
        }
        outcome.levels_gained.push(gained.level);
    }

    outcome.xp_gained += new_xp - old_xp;
    outcome.xp = new_xp;
    outcome.level = level.level;
    Ok(())
}

/// Apply XP, challenge progress and achievement unlocks for `actions`.
///
/// Each `(action, count)` pair counts `count` occurrences. Rewards from
/// challenges and achievements add XP but are not themselves evaluated again
/// until the next action.
pub async fn record_action(
    conn: &mut PgConnection,
    user_id: Uuid,
    actions: &[(Action, i32)],
    today: NaiveDate,
) -> Result<GamificationOutcome, LedgerError> {
    let mut outcome = GamificationOutcome::default();

    let mut xp: i32 = actions.iter().map(|(action, count)| action.xp() * count).sum();
    let mut credits = 0;

    for (action, count) in actions {
        for completed in challenges::advance(&mut *conn, user_id, *action, *count, today).await? {
            xp += completed.xp_reward;
            credits += completed.credit_reward;
            outcome.challenges_completed.push(completed.code);
        }
    }

    add_xp(&mut *conn, user_id, xp, &mut outcome).await?;
    if credits > 0 {
        ledger::apply(&mut *conn, user_id, credits, TransactionType::Bonus, "Challenges completed", None).await?;
        outcome.credits_awarded += credits;
    }

    evaluate_achievements(&mut *conn, user_id, &mut outcome).await?;
    Ok(outcome)
}

/// Unlock and reward every achievement the user now satisfies.
pub async fn evaluate_achievements(
    conn: &mut PgConnection,
    user_id: Uuid,
    outcome: &mut GamificationOutcome,
) -> Result<(), LedgerError> {
    let stats = achievements::load_stats(&mut *conn, user_id).await?;
    let catalog = achievements::catalog(&mut *conn).await?;
    let unlocked = achievements::unlocked_ids(&mut *conn, user_id).await?;

    let mut xp = 0;
    for achievement in achievements::newly_unlocked(&catalog, &unlocked, &stats) {
        if !achievements::unlock(&mut *conn, user_id, achievement.id).await? {
            continue;
        }
        tracing::info!(user_id = %user_id, code = %achievement.code, "🏆 Achievement unlocked");

        xp += achievement.xp_reward;
        if achievement.credit_reward > 0 {
            ledger::apply(
                &mut *conn,
                user_id,
                achievement.credit_reward,
                TransactionType::Bonus,
                &format!("Achievement: {}", achievement.name_en),
                None,
            )
            .await?;
            outcome.credits_awarded += achievement.credit_reward;
        }
        outcome.achievements_unlocked.push(achievement.code.clone());
    }

    if xp > 0 {
        add_xp(&mut *conn, user_id, xp, outcome).await?;
    }
    Ok(())
}
