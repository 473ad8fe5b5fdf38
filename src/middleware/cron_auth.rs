//! Bearer-secret guard for scheduler-triggered routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use subtle::ConstantTimeEq;

use crate::{errors::AppError, AppState};

fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    given.ct_eq(expected).into()
}

pub async fn require_cron_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let given = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match given {
        Some(secret)
            if !state.config.cron_secret.is_empty()
                && secrets_match(secret.as_bytes(), state.config.cron_secret.as_bytes()) =>
        {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "Blocked cron request with invalid secret");
            AppError::Unauthorized.into_response()
        }
    }
}
