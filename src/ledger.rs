//! Credit ledger.
//!
//! `users.credits` is a running balance over `credit_transactions`. Both are
//! always written together inside the caller's transaction, with the user row
//! locked, so they cannot drift apart.

use sqlx::{Connection, PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{CreditTransaction, TransactionType};
use crate::pricing::CreditPackage;

/// Unique index over external payment references.
const REFERENCE_INDEX: &str = "idx_credit_transactions_reference";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient credits: available {available}, required {required}")]
    InsufficientCredits { available: i32, required: i32 },

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Balance left after debiting `cost` from `balance`.
pub fn check_debit(balance: i32, cost: i32) -> Result<i32, LedgerError> {
    if cost > balance {
        return Err(LedgerError::InsufficientCredits {
            available: balance,
            required: cost,
        });
    }
    Ok(balance - cost)
}

/// Adjust the balance by `amount` (negative for spending) and append the ledger row.
///
/// Returns the new balance. Must run inside a transaction.
pub async fn apply(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
    tx_type: TransactionType,
    description: &str,
    reference: Option<&str>,
) -> Result<i32, LedgerError> {
    let balance = sqlx::query_scalar::<_, i32>("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::UserNotFound(user_id))?;

    let balance_after = if amount < 0 {
        check_debit(balance, -amount)?
    } else {
        balance + amount
    };

    sqlx::query("UPDATE users SET credits = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(balance_after)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO credit_transactions (user_id, amount, transaction_type, description, reference, balance_after)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(tx_type.as_str())
    .bind(description)
    .bind(reference)
    .bind(balance_after)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        user_id = %user_id,
        amount,
        tx_type = tx_type.as_str(),
        balance_after,
        "Ledger entry recorded"
    );

    Ok(balance_after)
}

/// Credit a purchased package. A reference that was already granted is a no-op.
///
/// Returns `None` when the purchase had already been fulfilled.
pub async fn grant_purchase(
    conn: &mut PgConnection,
    user_id: Uuid,
    package: &CreditPackage,
    reference: &str,
) -> Result<Option<i32>, LedgerError> {
    let already = sqlx::query_scalar::<_, i64>("SELECT id FROM credit_transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;

    if already.is_some() {
        tracing::info!(reference, "Purchase already fulfilled, skipping");
        return Ok(None);
    }

    let description = format!("Credit package: {} ({} credits)", package.id, package.credits);

    // A concurrent fulfilment of the same reference loses on the unique index
    let mut savepoint = conn.begin().await?;
    match apply(
        &mut *savepoint,
        user_id,
        package.credits,
        TransactionType::Purchase,
        &description,
        Some(reference),
    )
    .await
    {
        Ok(balance) => {
            savepoint.commit().await?;
            Ok(Some(balance))
        }
        Err(LedgerError::Database(sqlx::Error::Database(db_err))) if db_err.constraint() == Some(REFERENCE_INDEX) => {
            savepoint.rollback().await?;
            tracing::info!(reference, "Purchase fulfilled concurrently, skipping");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub async fn recent(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<CreditTransaction>, sqlx::Error> {
    sqlx::query_as::<_, CreditTransaction>(
        r#"
        SELECT id, user_id, amount, transaction_type, description, reference, balance_after, created_at
        FROM credit_transactions
        WHERE user_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_within_balance() {
        assert_eq!(check_debit(10, 10).unwrap(), 0);
        assert_eq!(check_debit(10, 3).unwrap(), 7);
    }

    #[test]
    fn debit_beyond_balance_is_rejected() {
        match check_debit(2, 3) {
            Err(LedgerError::InsufficientCredits { available, required }) => {
                assert_eq!(available, 2);
                assert_eq!(required, 3);
            }
            other => panic!("expected insufficient credits, got {:?}", other),
        }
    }
}
