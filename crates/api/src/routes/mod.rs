//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use axum::http::HeaderMap;
use common::UserId;
use domain::UserIdentity;
use uuid::Uuid;

use crate::error::ApiError;

/// Extracts the caller's user id from the gateway-supplied headers.
pub(crate) fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = required_header(headers, "x-user-id")?;
    let uuid = Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid x-user-id header: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}

/// Extracts the caller's full identity from the gateway-supplied headers.
///
/// Authentication itself is the gateway's concern; by the time a request
/// arrives here the identity headers are trusted.
pub(crate) fn identity_from_headers(headers: &HeaderMap) -> Result<UserIdentity, ApiError> {
    Ok(UserIdentity {
        id: user_id_from_headers(headers)?,
        email: required_header(headers, "x-user-email")?.to_string(),
        first_name: required_header(headers, "x-user-first-name")?.to_string(),
        last_name: required_header(headers, "x-user-last-name")?.to_string(),
    })
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))
}
