//! Credit packages, subscription plans and reading costs.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Spread;

/// Credits a new account starts with as free readings.
pub const FREE_READINGS_ON_SIGNUP: i32 = 3;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CreditPackage {
    pub id: &'static str,
    pub credits: i32,
    /// Price in EUR
    pub price: Decimal,
    pub popular: bool,
}

impl CreditPackage {
    pub fn price_per_credit(&self) -> Decimal {
        (self.price / Decimal::from(self.credits)).round_dp(4)
    }
}

pub fn credit_packages() -> [CreditPackage; 4] {
    [
        CreditPackage { id: "starter", credits: 5, price: Decimal::new(499, 2), popular: false },
        CreditPackage { id: "popular", credits: 15, price: Decimal::new(1299, 2), popular: true },
        CreditPackage { id: "value", credits: 30, price: Decimal::new(2299, 2), popular: false },
        CreditPackage { id: "premium", credits: 60, price: Decimal::new(3999, 2), popular: false },
    ]
}

pub fn find_package(id: &str) -> Option<CreditPackage> {
    credit_packages().into_iter().find(|p| p.id == id)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubscriptionPlan {
    pub id: &'static str,
    pub name_en: &'static str,
    pub name_es: &'static str,
    /// Credits debited at each monthly renewal when paid with credits
    pub credit_cost: i32,
    /// Card price in EUR when billed through the payment provider
    pub price: Decimal,
}

pub fn subscription_plans() -> [SubscriptionPlan; 1] {
    [SubscriptionPlan {
        id: "monthly",
        name_en: "Arcana Premium",
        name_es: "Arcana Premium",
        credit_cost: 10,
        price: Decimal::new(799, 2),
    }]
}

pub fn find_plan(id: &str) -> Option<SubscriptionPlan> {
    subscription_plans().into_iter().find(|p| p.id == id)
}

pub fn reading_cost(spread: Spread) -> i32 {
    match spread {
        Spread::OneCard => 1,
        Spread::ThreeCard => 2,
        Spread::CelticCross => 3,
    }
}

/// How a reading gets paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingCharge {
    Subscription,
    FreeReading,
    Credits(i32),
}

impl ReadingCharge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::FreeReading => "free",
            Self::Credits(_) => "credits",
        }
    }

    pub fn credits(&self) -> i32 {
        match self {
            Self::Credits(n) => *n,
            _ => 0,
        }
    }
}

pub fn charge_for(spread: Spread, free_readings_remaining: i32, has_subscription: bool) -> ReadingCharge {
    if has_subscription {
        ReadingCharge::Subscription
    } else if free_readings_remaining > 0 {
        ReadingCharge::FreeReading
    } else {
        ReadingCharge::Credits(reading_cost(spread))
    }
}
