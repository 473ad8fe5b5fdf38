use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::gamification::{levels::LevelInfo, streaks::StreakInfo};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Achievement {
    pub id: i32,
    pub code: String,
    pub name_en: String,
    pub name_es: String,
    pub description_en: String,
    pub description_es: String,
    pub icon: String,
    pub requirement_type: String,
    pub requirement_value: i32,
    pub xp_reward: i32,
    pub credit_reward: i32,
}

pub const ACHIEVEMENT_COLUMNS: &str = "id, code, name_en, name_es, description_en, description_es, icon, \
    requirement_type, requirement_value, xp_reward, credit_reward";

#[derive(Debug, Serialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub current: i32,
    pub progress: f64,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AchievementsResponse {
    pub unlocked: usize,
    pub total: usize,
    pub achievements: Vec<AchievementStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Challenge {
    pub id: i32,
    pub code: String,
    pub name_en: String,
    pub name_es: String,
    pub description_en: String,
    pub description_es: String,
    pub period: String,
    pub action: String,
    pub target: i32,
    pub xp_reward: i32,
    pub credit_reward: i32,
}

pub const CHALLENGE_COLUMNS: &str = "id, code, name_en, name_es, description_en, description_es, period, \
    action, target, xp_reward, credit_reward";

#[derive(Debug, Serialize)]
pub struct ChallengeStatus {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub progress: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub level: LevelInfo,
    pub streak: StreakInfo,
    pub total_readings: i32,
    pub cards_collected: i64,
}
