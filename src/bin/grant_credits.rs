//! Grant credits by hand.
//!
//! Usage:
//!   grant_credits <user-id> <package-id> <payment-reference>
//!   grant_credits <user-id> <amount> [description]

use anyhow::{bail, Context};
use sqlx::postgres::PgPoolOptions;
use std::env;
use uuid::Uuid;

use arcana::{ledger, models::TransactionType, pricing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("arcana=info,sqlx=warn").init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: grant_credits <user-id> <package-id|amount> [reference|description]");
    }

    let user_id = Uuid::parse_str(&args[0]).context("user id must be a UUID")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new().max_connections(1).connect(&database_url).await?;

    let mut tx = pool.begin().await?;

    if let Some(package) = pricing::find_package(&args[1]) {
        let reference = args.get(2).context("a payment reference is required for package grants")?;
        match ledger::grant_purchase(&mut *tx, user_id, &package, reference).await? {
            Some(balance) => println!("Granted {} credits ({}), balance now {}", package.credits, package.id, balance),
            None => println!("Reference {} was already fulfilled, nothing granted", reference),
        }
    } else {
        let amount: i32 = args[1]
            .parse()
            .with_context(|| format!("'{}' is neither a package id nor an amount", args[1]))?;
        if amount <= 0 {
            bail!("amount must be positive");
        }
        let description = args.get(2).map(String::as_str).unwrap_or("Manual grant");
        let balance = ledger::apply(&mut *tx, user_id, amount, TransactionType::Bonus, description, None).await?;
        println!("Granted {} bonus credits, balance now {}", amount, balance);
    }

    tx.commit().await?;
    Ok(())
}
