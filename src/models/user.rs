use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub credits: i32,
    pub xp: i32,
    pub level: i32,
    pub free_readings_remaining: i32,
    pub total_readings: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_daily_reading_on: Option<NaiveDate>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub referral_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const USER_COLUMNS: &str = "id, email, display_name, credits, xp, level, free_readings_remaining, \
    total_readings, current_streak, longest_streak, last_daily_reading_on, referral_code, referred_by, \
    referral_count, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub birth_date: Option<NaiveDate>,
    pub birth_time: Option<NaiveTime>,
    pub birth_place: Option<String>,
    pub zodiac_sign: Option<String>,
    pub locale: String,
    pub notification_time: Option<NaiveTime>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub birth_date: Option<NaiveDate>,
    pub birth_time: Option<NaiveTime>,
    #[validate(length(max = 120))]
    pub birth_place: Option<String>,
    #[validate(custom(function = "crate::models::validate_locale"))]
    pub locale: Option<String>,
    pub notification_time: Option<NaiveTime>,
    #[validate(length(min = 1, max = 60))]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email: String,
    pub display_name: Option<String>,
    pub referral_code: String,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemReferralRequest {
    #[validate(length(min = 4, max = 32))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LocaleRequest {
    #[validate(custom(function = "crate::models::validate_locale"))]
    pub locale: String,
}
