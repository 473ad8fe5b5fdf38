//! Run the credit subscription renewal once, for schedulers without HTTP access.

use anyhow::Context;
use chrono::Utc;
use std::env;

use arcana::{database, renewal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("arcana=info,sqlx=warn").init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = database::create_pool(&database_url).await?;

    let report = renewal::run(&pool, Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
