//! Achievement evaluation.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{Achievement, AchievementStatus, ACHIEVEMENT_COLUMNS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    TotalReadings,
    DailyStreak,
    CardsCollected,
    LevelReached,
    Referrals,
}

impl Requirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalReadings => "TOTAL_READINGS",
            Self::DailyStreak => "DAILY_STREAK",
            Self::CardsCollected => "CARDS_COLLECTED",
            Self::LevelReached => "LEVEL_REACHED",
            Self::Referrals => "REFERRALS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TOTAL_READINGS" => Some(Self::TotalReadings),
            "DAILY_STREAK" => Some(Self::DailyStreak),
            "CARDS_COLLECTED" => Some(Self::CardsCollected),
            "LEVEL_REACHED" => Some(Self::LevelReached),
            "REFERRALS" => Some(Self::Referrals),
            _ => None,
        }
    }
}

/// Counters achievements are measured against.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct UserStats {
    pub total_readings: i32,
    pub longest_streak: i32,
    pub cards_collected: i64,
    pub level: i32,
    pub referral_count: i32,
}

impl UserStats {
    pub fn value(&self, requirement: Requirement) -> i32 {
        match requirement {
            Requirement::TotalReadings => self.total_readings,
            Requirement::DailyStreak => self.longest_streak,
            Requirement::CardsCollected => self.cards_collected as i32,
            Requirement::LevelReached => self.level,
            Requirement::Referrals => self.referral_count,
        }
    }
}

pub fn current_value(achievement: &Achievement, stats: &UserStats) -> i32 {
    Requirement::from_str(&achievement.requirement_type)
        .map(|req| stats.value(req))
        .unwrap_or(0)
}

pub fn is_satisfied(achievement: &Achievement, stats: &UserStats) -> bool {
    Requirement::from_str(&achievement.requirement_type).is_some()
        && current_value(achievement, stats) >= achievement.requirement_value
}

pub fn progress(achievement: &Achievement, stats: &UserStats) -> f64 {
    if achievement.requirement_value <= 0 {
        return 100.0;
    }
    let ratio = current_value(achievement, stats) as f64 / achievement.requirement_value as f64;
    (ratio * 100.0).clamp(0.0, 100.0)
}

/// Achievements satisfied by `stats` that are not unlocked yet.
pub fn newly_unlocked<'a>(
    catalog: &'a [Achievement],
    unlocked: &[i32],
    stats: &UserStats,
) -> Vec<&'a Achievement> {
    catalog
        .iter()
        .filter(|a| !unlocked.contains(&a.id) && is_satisfied(a, stats))
        .collect()
}

const STATS_QUERY: &str = r#"
    SELECT
        u.total_readings,
        u.longest_streak,
        u.level,
        u.referral_count,
        (SELECT COUNT(*) FROM user_card_collection c WHERE c.user_id = u.id) AS cards_collected
    FROM users u
    WHERE u.id = $1
"#;

pub async fn load_stats(conn: &mut PgConnection, user_id: Uuid) -> Result<UserStats, sqlx::Error> {
    sqlx::query_as::<_, UserStats>(STATS_QUERY)
        .bind(user_id)
        .fetch_one(conn)
        .await
}

pub async fn catalog(conn: &mut PgConnection) -> Result<Vec<Achievement>, sqlx::Error> {
    let query = format!("SELECT {} FROM achievements ORDER BY id", ACHIEVEMENT_COLUMNS);
    sqlx::query_as::<_, Achievement>(&query).fetch_all(conn).await
}

pub async fn unlocked_ids(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT achievement_id FROM user_achievements WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

/// Record the unlock. Returns false when it was already recorded.
pub async fn unlock(conn: &mut PgConnection, user_id: Uuid, achievement_id: i32) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO user_achievements (user_id, achievement_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, achievement_id) DO NOTHING
        RETURNING achievement_id
        "#,
    )
    .bind(user_id)
    .bind(achievement_id)
    .fetch_optional(conn)
    .await?;
    Ok(inserted.is_some())
}

/// Catalog with the user's progress, for the achievements page.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<AchievementStatus>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    let stats = load_stats(&mut *conn, user_id).await?;
    let achievements = catalog(&mut *conn).await?;

    let unlocked: Vec<(i32, DateTime<Utc>)> = sqlx::query_as(
        "SELECT achievement_id, unlocked_at FROM user_achievements WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(achievements
        .into_iter()
        .map(|achievement| {
            let unlocked_at = unlocked
                .iter()
                .find(|(id, _)| *id == achievement.id)
                .map(|(_, at)| *at);
            AchievementStatus {
                current: current_value(&achievement, &stats),
                progress: if unlocked_at.is_some() { 100.0 } else { progress(&achievement, &stats) },
                unlocked_at,
                achievement,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn achievement(id: i32, requirement: Requirement, value: i32) -> Achievement {
        Achievement {
            id,
            code: format!("A{}", id),
            name_en: String::new(),
            name_es: String::new(),
            description_en: String::new(),
            description_es: String::new(),
            icon: String::new(),
            requirement_type: requirement.as_str().to_string(),
            requirement_value: value,
            xp_reward: 10,
            credit_reward: 0,
        }
    }

    #[test]
    fn evaluates_each_requirement_against_its_counter() {
        let stats = UserStats {
            total_readings: 10,
            longest_streak: 6,
            cards_collected: 22,
            level: 3,
            referral_count: 0,
        };
        assert!(is_satisfied(&achievement(1, Requirement::TotalReadings, 10), &stats));
        assert!(!is_satisfied(&achievement(2, Requirement::DailyStreak, 7), &stats));
        assert!(is_satisfied(&achievement(3, Requirement::CardsCollected, 22), &stats));
        assert!(!is_satisfied(&achievement(4, Requirement::LevelReached, 5), &stats));
        assert!(!is_satisfied(&achievement(5, Requirement::Referrals, 1), &stats));
    }

    #[test]
    fn already_unlocked_are_skipped() {
        let catalog = vec![
            achievement(1, Requirement::TotalReadings, 1),
            achievement(2, Requirement::TotalReadings, 5),
            achievement(3, Requirement::TotalReadings, 50),
        ];
        let stats = UserStats {
            total_readings: 5,
            ..Default::default()
        };
        let new: Vec<i32> = newly_unlocked(&catalog, &[1], &stats).iter().map(|a| a.id).collect();
        assert_eq!(new, vec![2]);
    }

    #[test]
    fn unknown_requirement_never_unlocks() {
        let mut odd = achievement(9, Requirement::TotalReadings, 0);
        odd.requirement_type = "MOON_PHASE".to_string();
        assert!(!is_satisfied(&odd, &UserStats::default()));
    }

    #[test]
    fn progress_is_capped() {
        let stats = UserStats {
            total_readings: 25,
            ..Default::default()
        };
        assert_eq!(progress(&achievement(1, Requirement::TotalReadings, 50), &stats), 50.0);
        assert_eq!(progress(&achievement(1, Requirement::TotalReadings, 10), &stats), 100.0);
    }
}
