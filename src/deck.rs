//! The 78-card tarot deck and random draws.
//!
//! Card ids are stable: 0-21 are the major arcana in order, then each suit
//! (wands, cups, swords, pentacles) takes 14 ids from ace to king.

use rand::{seq::index::sample, Rng};
use sqlx::PgPool;

use crate::models::{DrawnCard, Spread};

pub const DECK_SIZE: usize = 78;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckCard {
    pub id: i32,
    pub slug: String,
    pub arcana: &'static str,
    pub suit: Option<&'static str>,
    pub number: i32,
    pub name_en: String,
    pub name_es: String,
    pub keywords_en: &'static str,
    pub keywords_es: &'static str,
}

const MAJOR: [(&str, &str, &str, &str); 22] = [
    ("The Fool", "El Loco", "new beginnings, spontaneity, faith", "nuevos comienzos, espontaneidad, fe"),
    ("The Magician", "El Mago", "willpower, skill, manifestation", "voluntad, habilidad, manifestación"),
    ("The High Priestess", "La Sacerdotisa", "intuition, mystery, inner voice", "intuición, misterio, voz interior"),
    ("The Empress", "La Emperatriz", "abundance, nurturing, creativity", "abundancia, cuidado, creatividad"),
    ("The Emperor", "El Emperador", "structure, authority, stability", "estructura, autoridad, estabilidad"),
    ("The Hierophant", "El Sumo Sacerdote", "tradition, guidance, belief", "tradición, guía, creencias"),
    ("The Lovers", "Los Enamorados", "union, choice, harmony", "unión, elección, armonía"),
    ("The Chariot", "El Carro", "determination, victory, control", "determinación, victoria, control"),
    ("Strength", "La Fuerza", "courage, patience, compassion", "valor, paciencia, compasión"),
    ("The Hermit", "El Ermitaño", "introspection, solitude, wisdom", "introspección, soledad, sabiduría"),
    ("Wheel of Fortune", "La Rueda de la Fortuna", "cycles, fate, turning point", "ciclos, destino, punto de inflexión"),
    ("Justice", "La Justicia", "fairness, truth, cause and effect", "equidad, verdad, causa y efecto"),
    ("The Hanged Man", "El Colgado", "surrender, new perspective, pause", "entrega, nueva perspectiva, pausa"),
    ("Death", "La Muerte", "endings, transformation, release", "finales, transformación, liberación"),
    ("Temperance", "La Templanza", "balance, moderation, healing", "equilibrio, moderación, sanación"),
    ("The Devil", "El Diablo", "attachment, temptation, shadow", "apego, tentación, sombra"),
    ("The Tower", "La Torre", "upheaval, revelation, sudden change", "ruptura, revelación, cambio repentino"),
    ("The Star", "La Estrella", "hope, renewal, inspiration", "esperanza, renovación, inspiración"),
    ("The Moon", "La Luna", "illusion, dreams, the unconscious", "ilusión, sueños, el inconsciente"),
    ("The Sun", "El Sol", "joy, vitality, success", "alegría, vitalidad, éxito"),
    ("Judgement", "El Juicio", "awakening, reckoning, renewal", "despertar, evaluación, renacer"),
    ("The World", "El Mundo", "completion, integration, fulfilment", "culminación, integración, plenitud"),
];

// (slug, en, es, theme en, theme es)
const SUITS: [(&str, &str, &str, &str, &str); 4] = [
    ("wands", "Wands", "Bastos", "energy, ambition, action", "energía, ambición, acción"),
    ("cups", "Cups", "Copas", "emotions, relationships, intuition", "emociones, relaciones, intuición"),
    ("swords", "Swords", "Espadas", "thought, conflict, clarity", "pensamiento, conflicto, claridad"),
    ("pentacles", "Pentacles", "Oros", "work, money, the material world", "trabajo, dinero, el mundo material"),
];

const RANKS: [(&str, &str); 14] = [
    ("Ace", "As"),
    ("Two", "Dos"),
    ("Three", "Tres"),
    ("Four", "Cuatro"),
    ("Five", "Cinco"),
    ("Six", "Seis"),
    ("Seven", "Siete"),
    ("Eight", "Ocho"),
    ("Nine", "Nueve"),
    ("Ten", "Diez"),
    ("Page", "Sota"),
    ("Knight", "Caballo"),
    ("Queen", "Reina"),
    ("King", "Rey"),
];

pub fn full_deck() -> Vec<DeckCard> {
    let mut deck = Vec::with_capacity(DECK_SIZE);

    for (number, (name_en, name_es, keywords_en, keywords_es)) in MAJOR.iter().enumerate() {
        deck.push(DeckCard {
            id: number as i32,
            slug: slugify(name_en),
            arcana: "major",
            suit: None,
            number: number as i32,
            name_en: name_en.to_string(),
            name_es: name_es.to_string(),
            keywords_en: *keywords_en,
            keywords_es: *keywords_es,
        });
    }

    for (suit_index, (suit, suit_en, suit_es, theme_en, theme_es)) in SUITS.iter().enumerate() {
        for (rank_index, (rank_en, rank_es)) in RANKS.iter().enumerate() {
            let name_en = format!("{} of {}", rank_en, suit_en);
            deck.push(DeckCard {
                id: (MAJOR.len() + suit_index * RANKS.len() + rank_index) as i32,
                slug: slugify(&name_en),
                arcana: "minor",
                suit: Some(*suit),
                number: rank_index as i32 + 1,
                name_en,
                name_es: format!("{} de {}", rank_es, suit_es),
                keywords_en: *theme_en,
                keywords_es: *theme_es,
            });
        }
    }

    deck
}

pub fn card(id: i32) -> Option<DeckCard> {
    full_deck().into_iter().find(|c| c.id == id)
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Draw distinct cards for every position of `spread`.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, spread: Spread) -> Vec<DrawnCard> {
    sample(rng, DECK_SIZE, spread.card_count())
        .into_iter()
        .enumerate()
        .map(|(position, card)| DrawnCard {
            position,
            card_id: card as i32,
            reversed: rng.gen_bool(0.5),
        })
        .collect()
}

/// Upsert the deck identities into `cards`. Editorial meanings are left untouched.
pub async fn sync(pool: &PgPool) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let deck = full_deck();

    for card in &deck {
        sqlx::query(
            r#"
            INSERT INTO cards (id, slug, arcana, suit, number, name_en, name_es)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                slug = EXCLUDED.slug,
                arcana = EXCLUDED.arcana,
                suit = EXCLUDED.suit,
                number = EXCLUDED.number,
                name_en = EXCLUDED.name_en,
                name_es = EXCLUDED.name_es
            "#,
        )
        .bind(card.id)
        .bind(&card.slug)
        .bind(card.arcana)
        .bind(card.suit)
        .bind(card.number)
        .bind(&card.name_en)
        .bind(&card.name_es)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(deck.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn deck_has_78_unique_cards() {
        let deck = full_deck();
        assert_eq!(deck.len(), DECK_SIZE);

        let ids: HashSet<i32> = deck.iter().map(|c| c.id).collect();
        let slugs: HashSet<&str> = deck.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(ids.len(), DECK_SIZE);
        assert_eq!(slugs.len(), DECK_SIZE);
        assert_eq!(deck.iter().filter(|c| c.arcana == "major").count(), 22);
    }

    #[test]
    fn minor_arcana_names() {
        let ace = card(22).unwrap();
        assert_eq!(ace.name_en, "Ace of Wands");
        assert_eq!(ace.name_es, "As de Bastos");
        let king = card(77).unwrap();
        assert_eq!(king.name_en, "King of Pentacles");
        assert_eq!(king.number, 14);
        assert_eq!(card(0).unwrap().slug, "the-fool");
    }

    #[test]
    fn draw_gives_distinct_cards_per_position() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let drawn = draw(&mut rng, Spread::CelticCross);
            assert_eq!(drawn.len(), 10);
            let ids: HashSet<i32> = drawn.iter().map(|c| c.card_id).collect();
            assert_eq!(ids.len(), 10);
            assert!(drawn.iter().enumerate().all(|(i, c)| c.position == i));
            assert!(drawn.iter().all(|c| (0..78).contains(&c.card_id)));
        }
    }
}
