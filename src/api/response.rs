//! HTTP response mapping for source data and errors

use axum::Json;
use axum::http::header::{CACHE_CONTROL, RETRY_AFTER};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::cache::CacheRead;
use crate::error::WinterReadyError;

/// Set on 200 responses that carry a source's static fallback
pub static DATA_DEGRADED: HeaderName = HeaderName::from_static("x-data-degraded");

/// Shared-cache lifetimes per endpoint
pub mod cache_control {
    pub const WEATHER: &str = "public, s-maxage=900, stale-while-revalidate=1800";
    pub const AVALANCHE: &str = "public, s-maxage=1800, stale-while-revalidate=3600";
    pub const ROADS: &str = "public, s-maxage=300, stale-while-revalidate=600";
    pub const OCEAN: &str = "public, s-maxage=1800, stale-while-revalidate=3600";
    pub const AURORA: &str = "public, s-maxage=900, stale-while-revalidate=1800";
    pub const SAFETY: &str = "public, s-maxage=300, stale-while-revalidate=600";
    pub const DESTINATIONS: &str = "public, max-age=86400";
    pub const NO_STORE: &str = "no-store";
}

/// JSON body with a `Cache-Control` header
pub fn cached_json<T: Serialize>(value: &T, cache_control: &'static str) -> Response {
    (
        [(CACHE_CONTROL, HeaderValue::from_static(cache_control))],
        Json(value),
    )
        .into_response()
}

/// A cache read as JSON, flagged when the value is a fallback
pub fn source_json<T: Serialize>(read: &CacheRead<T>, cache_control: &'static str) -> Response {
    let mut response = cached_json(&read.value, cache_control);
    if read.degraded {
        response
            .headers_mut()
            .insert(DATA_DEGRADED.clone(), HeaderValue::from_static("true"));
    }
    response
}

impl IntoResponse for WinterReadyError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.user_message(),
            "code": self.code().as_str(),
        }));

        match self {
            WinterReadyError::Validation { .. } => (StatusCode::BAD_REQUEST, body).into_response(),
            WinterReadyError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(RETRY_AFTER, retry_after.as_secs().to_string())],
                body,
            )
                .into_response(),
            WinterReadyError::Forbidden { .. } => (StatusCode::FORBIDDEN, body).into_response(),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(CACHE_CONTROL, HeaderValue::from_static(cache_control::NO_STORE))],
                    body,
                )
                    .into_response()
            }
        }
    }
}
