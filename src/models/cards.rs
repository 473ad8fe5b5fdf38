use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Card row; meanings are editorial content and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: i32,
    pub slug: String,
    pub arcana: String,
    pub suit: Option<String>,
    pub number: i32,
    pub name_en: String,
    pub name_es: String,
    pub meaning_upright_en: Option<String>,
    pub meaning_upright_es: Option<String>,
    pub meaning_reversed_en: Option<String>,
    pub meaning_reversed_es: Option<String>,
}

pub const CARD_COLUMNS: &str = "id, slug, arcana, suit, number, name_en, name_es, meaning_upright_en, \
    meaning_upright_es, meaning_reversed_en, meaning_reversed_es";

impl Card {
    pub fn name(&self, locale: &str) -> &str {
        if locale == "en" {
            &self.name_en
        } else {
            &self.name_es
        }
    }

    pub fn meaning(&self, locale: &str, reversed: bool) -> Option<&str> {
        let meaning = match (locale == "en", reversed) {
            (true, false) => &self.meaning_upright_en,
            (true, true) => &self.meaning_reversed_en,
            (false, false) => &self.meaning_upright_es,
            (false, true) => &self.meaning_reversed_es,
        };
        meaning.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CollectedCard {
    pub card_id: i32,
    pub first_drawn_at: DateTime<Utc>,
    pub times_drawn: i32,
}

#[derive(Debug, Serialize)]
pub struct CollectionGroup {
    pub key: String,
    pub discovered: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub discovered: i64,
    pub total: i64,
    pub percentage: f64,
    pub groups: Vec<CollectionGroup>,
    pub cards: Vec<CollectedCard>,
}
