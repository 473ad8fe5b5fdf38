use axum::{response::Json, routing::post, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::LocaleRequest;
use crate::AppState;

pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/locale", post(set_locale))
}

/// Remember the UI language for a year.
async fn set_locale(jar: CookieJar, Json(payload): Json<LocaleRequest>) -> Result<(CookieJar, Json<serde_json::Value>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Validation error: {}", e)))?;

    let cookie = Cookie::build((LOCALE_COOKIE, payload.locale.clone()))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(365));

    Ok((jar.add(cookie), Json(json!({ "locale": payload.locale }))))
}
