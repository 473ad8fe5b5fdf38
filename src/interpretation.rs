//! Reading interpretations.
//!
//! Interpretations come from an OpenAI-compatible chat completions endpoint.
//! When no key is configured, or the provider fails, a template built from the
//! card keywords is used instead so a reading never fails on this step.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, warn};

use crate::config::LlmConfig;
use crate::deck;
use crate::models::{DrawnCard, Spread};
use crate::zodiac::ZodiacSign;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_TOKENS: u32 = 700;

#[derive(Debug, thiserror::Error)]
pub enum InterpretationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Provider returned no content")]
    Empty,

    #[error("Invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// What to interpret.
#[derive(Debug, Clone)]
pub struct ReadingContext<'a> {
    pub spread: Spread,
    pub question: Option<&'a str>,
    pub cards: &'a [DrawnCard],
    pub locale: &'a str,
    pub zodiac: Option<ZodiacSign>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct Interpreter {
    client: reqwest::Client,
    config: LlmConfig,
}

impl Interpreter {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Interpretation text for a reading. Never fails.
    pub async fn interpret(&self, context: &ReadingContext<'_>) -> String {
        if !self.is_configured() {
            return fallback(context);
        }

        match self.request(context).await {
            Ok(text) => text,
            Err(e) => {
                error!("Interpretation provider failed, using template: {}", e);
                fallback(context)
            }
        }
    }

    async fn request(&self, context: &ReadingContext<'_>) -> Result<String, InterpretationError> {
        let url = self.config.api_url.join("chat/completions")?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(context.locale).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(context),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.8,
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(InterpretationError::Status(response.status()));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(InterpretationError::Empty)
    }
}

fn system_prompt(locale: &str) -> &'static str {
    if locale == "en" {
        "You are a warm, insightful tarot reader. Interpret the spread as a whole, \
         card by card, in clear English. Keep it under 350 words. Do not predict \
         health, legal or financial outcomes."
    } else {
        "Eres una tarotista cálida y perspicaz. Interpreta la tirada en conjunto, \
         carta por carta, en un español claro. Máximo 350 palabras. No hagas \
         predicciones de salud, legales ni financieras."
    }
}

fn user_prompt(context: &ReadingContext<'_>) -> String {
    let en = context.locale == "en";
    let positions = context.spread.positions();
    let mut prompt = String::new();

    if let Some(question) = context.question.filter(|q| !q.trim().is_empty()) {
        prompt.push_str(if en { "Question: " } else { "Pregunta: " });
        prompt.push_str(question.trim());
        prompt.push('\n');
    }
    if let Some(sign) = context.zodiac {
        prompt.push_str(if en { "Sun sign: " } else { "Signo solar: " });
        prompt.push_str(sign.name(context.locale));
        prompt.push('\n');
    }

    prompt.push_str(if en { "Cards:\n" } else { "Cartas:\n" });
    for drawn in context.cards {
        let Some(card) = deck::card(drawn.card_id) else { continue };
        let (position_en, position_es) = positions.get(drawn.position).copied().unwrap_or(("", ""));
        let line = if en {
            format!(
                "- {}: {}{}\n",
                position_en,
                card.name_en,
                if drawn.reversed { " (reversed)" } else { "" }
            )
        } else {
            format!(
                "- {}: {}{}\n",
                position_es,
                card.name_es,
                if drawn.reversed { " (invertida)" } else { "" }
            )
        };
        prompt.push_str(&line);
    }

    prompt
}

/// Deterministic interpretation from card keywords.
pub fn fallback(context: &ReadingContext<'_>) -> String {
    let en = context.locale == "en";
    let positions = context.spread.positions();
    let mut paragraphs = Vec::with_capacity(context.cards.len() + 1);

    for drawn in context.cards {
        let Some(card) = deck::card(drawn.card_id) else { continue };
        let (position_en, position_es) = positions.get(drawn.position).copied().unwrap_or(("", ""));
        let paragraph = match (en, drawn.reversed) {
            (true, false) => format!(
                "{}: {} speaks of {}.",
                position_en, card.name_en, card.keywords_en
            ),
            (true, true) => format!(
                "{}: {}, reversed, points to blocked or inward {}.",
                position_en, card.name_en, card.keywords_en
            ),
            (false, false) => format!(
                "{}: {} habla de {}.",
                position_es, card.name_es, card.keywords_es
            ),
            (false, true) => format!(
                "{}: {}, invertida, señala {} bloqueados o vividos hacia dentro.",
                position_es, card.name_es, card.keywords_es
            ),
        };
        paragraphs.push(paragraph);
    }

    if let Some(sign) = context.zodiac {
        paragraphs.push(if en {
            format!("As a {}, trust your own rhythm while these energies unfold.", sign.name("en"))
        } else {
            format!("Como {}, confía en tu propio ritmo mientras estas energías se despliegan.", sign.name("es"))
        });
    }

    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn three_cards() -> Vec<DrawnCard> {
        vec![
            DrawnCard { position: 0, card_id: 0, reversed: false },
            DrawnCard { position: 1, card_id: 13, reversed: true },
            DrawnCard { position: 2, card_id: 77, reversed: false },
        ]
    }

    #[test]
    fn fallback_names_every_position_in_locale() {
        let cards = three_cards();
        let context = ReadingContext {
            spread: Spread::ThreeCard,
            question: None,
            cards: &cards,
            locale: "en",
            zodiac: None,
        };
        let text = fallback(&context);
        assert!(text.contains("Past: The Fool"));
        assert!(text.contains("Present: Death, reversed"));
        assert!(text.contains("Future: King of Pentacles"));
    }

    #[test]
    fn fallback_in_spanish_mentions_sign() {
        let cards = three_cards();
        let context = ReadingContext {
            spread: Spread::ThreeCard,
            question: Some("¿Qué me depara el mes?"),
            cards: &cards,
            locale: "es",
            zodiac: Some(ZodiacSign::Leo),
        };
        let text = fallback(&context);
        assert!(text.contains("Pasado: El Loco"));
        assert!(text.contains("invertida"));
        assert!(text.contains(ZodiacSign::Leo.name("es")));
    }

    #[test]
    fn prompt_includes_question_and_orientation() {
        let cards = three_cards();
        let context = ReadingContext {
            spread: Spread::ThreeCard,
            question: Some("  Will the move go well?  "),
            cards: &cards,
            locale: "en",
            zodiac: Some(ZodiacSign::Pisces),
        };
        let prompt = user_prompt(&context);
        assert!(prompt.starts_with("Question: Will the move go well?\n"));
        assert!(prompt.contains("- Present: Death (reversed)"));
    }

    #[tokio::test]
    async fn unconfigured_interpreter_uses_template() {
        let interpreter = Interpreter::new(LlmConfig {
            api_url: Url::parse("http://127.0.0.1:9/").unwrap(),
            api_key: None,
            model: "test".to_string(),
        });
        let cards = three_cards();
        let context = ReadingContext {
            spread: Spread::ThreeCard,
            question: None,
            cards: &cards,
            locale: "en",
            zodiac: None,
        };
        assert_eq!(interpreter.interpret(&context).await, fallback(&context));
    }
}
