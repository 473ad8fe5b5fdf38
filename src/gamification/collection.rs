//! Card collection: which cards a user has drawn at least once.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::deck::{self, DECK_SIZE};
use crate::models::{CollectedCard, CollectionGroup, CollectionResponse};

/// Record drawn cards. Returns the ids drawn for the first time.
pub async fn record_draws(conn: &mut PgConnection, user_id: Uuid, card_ids: &[i32]) -> Result<Vec<i32>, sqlx::Error> {
    let mut discovered = Vec::new();

    for &card_id in card_ids {
        // xmax is zero only for freshly inserted rows
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO user_card_collection (user_id, card_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, card_id) DO UPDATE
            SET times_drawn = user_card_collection.times_drawn + 1
            RETURNING (xmax = 0)
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .fetch_one(&mut *conn)
        .await?;

        if inserted {
            discovered.push(card_id);
        }
    }

    Ok(discovered)
}

pub async fn count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_card_collection WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Group discovered cards by major arcana and suit.
pub fn summarize(cards: Vec<CollectedCard>) -> CollectionResponse {
    let deck = deck::full_deck();
    let mut groups: Vec<CollectionGroup> = Vec::new();

    for card in &deck {
        let key = card.suit.unwrap_or("major").to_string();
        let is_discovered = cards.iter().any(|c| c.card_id == card.id);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => {
                group.total += 1;
                group.discovered += is_discovered as i64;
            }
            None => groups.push(CollectionGroup {
                key,
                discovered: is_discovered as i64,
                total: 1,
            }),
        }
    }

    let discovered = groups.iter().map(|g| g.discovered).sum::<i64>();
    CollectionResponse {
        discovered,
        total: DECK_SIZE as i64,
        percentage: (discovered as f64 / DECK_SIZE as f64 * 100.0 * 10.0).round() / 10.0,
        groups,
        cards,
    }
}

pub async fn for_user(pool: &PgPool, user_id: Uuid) -> Result<CollectionResponse, sqlx::Error> {
    let cards = sqlx::query_as::<_, CollectedCard>(
        r#"
        SELECT card_id, first_drawn_at, times_drawn
        FROM user_card_collection
        WHERE user_id = $1
        ORDER BY card_id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(summarize(cards))
}
