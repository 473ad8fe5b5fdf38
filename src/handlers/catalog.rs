use axum::{response::Json, routing::get, Router};

use crate::{
    models::CreditPackageResponse,
    pricing::{self, SubscriptionPlan},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/credits/packages", get(list_packages))
        .route("/api/subscription/plans", get(list_plans))
}

/// Credit packages, smallest first
async fn list_packages() -> Json<Vec<CreditPackageResponse>> {
    Json(
        pricing::credit_packages()
            .into_iter()
            .map(|package| CreditPackageResponse {
                price_per_credit: package.price_per_credit(),
                package,
            })
            .collect(),
    )
}

async fn list_plans() -> Json<Vec<SubscriptionPlan>> {
    Json(pricing::subscription_plans().to_vec())
}
