//! Referral codes and redemption.

use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::gamification::{self, GamificationOutcome};
use crate::ledger::{self, LedgerError};
use crate::models::TransactionType;

pub const CODE_LENGTH: usize = 8;
/// Excludes 0/O and 1/I/L.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const REFEREE_BONUS: i32 = 2;
pub const REFERRER_BONUS: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("A referral code has already been redeemed for this account")]
    AlreadyReferred,

    #[error("Unknown referral code")]
    UnknownCode,

    #[error("You cannot redeem your own referral code")]
    OwnCode,

    #[error("This user joined with your referral code")]
    MutualReferral,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<sqlx::Error> for ReferralError {
    fn from(err: sqlx::Error) -> Self {
        ReferralError::Ledger(LedgerError::Database(err))
    }
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// The account owning a referral code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referrer {
    pub id: Uuid,
    pub referred_by: Option<Uuid>,
}

/// Checks a redemption and returns the referrer's id.
pub fn validate(redeemer: Uuid, already_referred: bool, referrer: Option<Referrer>) -> Result<Uuid, ReferralError> {
    if already_referred {
        return Err(ReferralError::AlreadyReferred);
    }
    match referrer {
        None => Err(ReferralError::UnknownCode),
        Some(r) if r.id == redeemer => Err(ReferralError::OwnCode),
        Some(r) if r.referred_by == Some(redeemer) => Err(ReferralError::MutualReferral),
        Some(r) => Ok(r.id),
    }
}

#[derive(Debug, Serialize)]
pub struct Redemption {
    pub credits_awarded: i32,
    pub balance: i32,
}

pub async fn redeem(pool: &PgPool, user_id: Uuid, code: &str) -> Result<Redemption, ReferralError> {
    let code = normalize_code(code);
    let mut tx = pool.begin().await?;

    let referrer_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE referral_code = $1")
        .bind(&code)
        .fetch_optional(&mut *tx)
        .await?;

    // Lock both accounts in id order so crossed redemptions queue instead of deadlocking
    let mut ids = vec![user_id];
    ids.extend(referrer_id.filter(|id| *id != user_id));
    let rows: Vec<(Uuid, Option<Uuid>)> =
        sqlx::query_as("SELECT id, referred_by FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

    let referred_by = rows
        .iter()
        .find(|(id, _)| *id == user_id)
        .map(|(_, referred_by)| *referred_by)
        .ok_or(LedgerError::UserNotFound(user_id))?;
    let referrer = referrer_id.and_then(|referrer_id| {
        rows.iter()
            .find(|(id, _)| *id == referrer_id)
            .map(|(id, referred_by)| Referrer {
                id: *id,
                referred_by: *referred_by,
            })
    });

    let referrer_id = validate(user_id, referred_by.is_some(), referrer)?;

    sqlx::query("UPDATE users SET referred_by = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(referrer_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET referral_count = referral_count + 1, updated_at = NOW() WHERE id = $1")
        .bind(referrer_id)
        .execute(&mut *tx)
        .await?;

    let balance = ledger::apply(
        &mut *tx,
        user_id,
        REFEREE_BONUS,
        TransactionType::Referral,
        &format!("Referral code {} redeemed", code),
        None,
    )
    .await?;
    ledger::apply(
        &mut *tx,
        referrer_id,
        REFERRER_BONUS,
        TransactionType::Referral,
        "Friend joined with your referral code",
        None,
    )
    .await?;

    let mut referrer_outcome = GamificationOutcome::default();
    gamification::evaluate_achievements(&mut *tx, referrer_id, &mut referrer_outcome).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        referrer_id = %referrer_id,
        achievements = ?referrer_outcome.achievements_unlocked,
        "🤝 Referral redeemed"
    );
    Ok(Redemption {
        credits_awarded: REFEREE_BONUS,
        balance,
    })
}

#[derive(Debug, Serialize)]
pub struct ReferralSummary {
    pub code: String,
    pub referral_count: i32,
    pub has_redeemed: bool,
    pub referee_bonus: i32,
    pub referrer_bonus: i32,
}

pub async fn summary(pool: &PgPool, user_id: Uuid) -> Result<Option<ReferralSummary>, sqlx::Error> {
    let row: Option<(String, i32, Option<Uuid>)> =
        sqlx::query_as("SELECT referral_code, referral_count, referred_by FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(code, referral_count, referred_by)| ReferralSummary {
        code,
        referral_count,
        has_redeemed: referred_by.is_some(),
        referee_bonus: REFEREE_BONUS,
        referrer_bonus: REFERRER_BONUS,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn codes_use_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)), "{}", code);
            assert!(!code.contains('O') && !code.contains('0') && !code.contains('I'));
        }
    }

    #[test]
    fn normalizes_user_input() {
        assert_eq!(normalize_code("  abcd2345 "), "ABCD2345");
    }

    #[test]
    fn redemption_rules() {
        let me = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let referrer = |id| Some(Referrer { id, referred_by: None });
        assert!(matches!(validate(me, true, referrer(friend)), Err(ReferralError::AlreadyReferred)));
        assert!(matches!(validate(me, false, None), Err(ReferralError::UnknownCode)));
        assert!(matches!(validate(me, false, referrer(me)), Err(ReferralError::OwnCode)));
        assert_eq!(validate(me, false, referrer(friend)).unwrap(), friend);
    }

    #[test]
    fn referrer_cannot_be_referred_back() {
        let me = Uuid::new_v4();
        let friend = Referrer {
            id: Uuid::new_v4(),
            referred_by: Some(me),
        };
        assert!(matches!(validate(me, false, Some(friend)), Err(ReferralError::MutualReferral)));

        let stranger = Referrer {
            id: Uuid::new_v4(),
            referred_by: Some(Uuid::new_v4()),
        };
        assert_eq!(validate(me, false, Some(stranger)).unwrap(), stranger.id);
    }
}
