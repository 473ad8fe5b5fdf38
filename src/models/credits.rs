use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pricing::CreditPackage;

/// Ledger entry types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Purchase,
    Referral,
    Bonus,
    Subscription,
    Reading,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Referral => "REFERRAL",
            Self::Bonus => "BONUS",
            Self::Subscription => "SUBSCRIPTION",
            Self::Reading => "READING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PURCHASE" => Some(Self::Purchase),
            "REFERRAL" => Some(Self::Referral),
            "BONUS" => Some(Self::Bonus),
            "SUBSCRIPTION" => Some(Self::Subscription),
            "READING" => Some(Self::Reading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditTransaction {
    pub id: i64,
    pub user_id: Uuid,
    pub amount: i32,
    pub transaction_type: String,
    pub description: String,
    pub reference: Option<String>,
    pub balance_after: i32,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    pub fn tx_type(&self) -> Option<TransactionType> {
        TransactionType::from_str(&self.transaction_type)
    }
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub credits: i32,
    pub free_readings_remaining: i32,
    pub has_active_subscription: bool,
    pub recent_transactions: Vec<CreditTransaction>,
}

#[derive(Debug, Serialize)]
pub struct CreditPackageResponse {
    #[serde(flatten)]
    pub package: CreditPackage,
    pub price_per_credit: rust_decimal::Decimal,
}
