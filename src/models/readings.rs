use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::gamification::GamificationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spread {
    OneCard,
    ThreeCard,
    CelticCross,
}

impl Spread {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneCard => "one_card",
            Self::ThreeCard => "three_card",
            Self::CelticCross => "celtic_cross",
        }
    }

    /// Position labels (EN, ES) in draw order.
    pub fn positions(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::OneCard => &[("Guidance", "Guía")],
            Self::ThreeCard => &[("Past", "Pasado"), ("Present", "Presente"), ("Future", "Futuro")],
            Self::CelticCross => &[
                ("Present", "Presente"),
                ("Challenge", "Desafío"),
                ("Foundation", "Base"),
                ("Recent past", "Pasado reciente"),
                ("Potential", "Potencial"),
                ("Near future", "Futuro cercano"),
                ("Self", "Uno mismo"),
                ("Environment", "Entorno"),
                ("Hopes and fears", "Esperanzas y miedos"),
                ("Outcome", "Resultado"),
            ],
        }
    }

    pub fn card_count(&self) -> usize {
        self.positions().len()
    }
}

/// One card placed in a spread position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnCard {
    pub position: usize,
    pub card_id: i32,
    pub reversed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reading {
    pub id: Uuid,
    pub user_id: Uuid,
    pub spread: String,
    pub question: Option<String>,
    pub locale: String,
    pub cards: Json<Vec<DrawnCard>>,
    pub interpretation: String,
    pub charge: String,
    pub credits_spent: i32,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
}

pub const READING_COLUMNS: &str =
    "id, user_id, spread, question, locale, cards, interpretation, charge, credits_spent, is_shared, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyReading {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reading_date: NaiveDate,
    pub card_id: i32,
    pub reversed: bool,
    pub interpretation: String,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
}

pub const DAILY_READING_COLUMNS: &str =
    "id, user_id, reading_date, card_id, reversed, interpretation, is_shared, created_at";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReadingRequest {
    pub spread: Spread,
    #[validate(length(max = 500))]
    pub question: Option<String>,
    #[validate(custom(function = "crate::models::validate_locale"))]
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingHistoryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub shared: bool,
}

#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    pub reading: Reading,
    pub gamification: GamificationOutcome,
}

#[derive(Debug, Serialize)]
pub struct ReadingHistoryResponse {
    pub readings: Vec<Reading>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct DailyReadingResponse {
    pub reading: DailyReading,
    pub card: crate::models::Card,
    pub streak: i32,
    pub is_new: bool,
    pub milestone_credits: i32,
    pub gamification: Option<GamificationOutcome>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub is_shared: bool,
    pub gamification: Option<GamificationOutcome>,
}

/// A shared reading as shown to anyone with the link.
#[derive(Debug, Serialize)]
pub struct PublicReading {
    pub id: Uuid,
    pub spread: String,
    pub question: Option<String>,
    pub locale: String,
    pub cards: Vec<DrawnCard>,
    pub card_details: Vec<crate::models::Card>,
    pub interpretation: String,
    pub created_at: DateTime<Utc>,
}

impl PublicReading {
    pub fn new(reading: Reading, card_details: Vec<crate::models::Card>) -> Self {
        Self {
            id: reading.id,
            spread: reading.spread,
            question: reading.question,
            locale: reading.locale,
            cards: reading.cards.0,
            card_details,
            interpretation: reading.interpretation,
            created_at: reading.created_at,
        }
    }
}
