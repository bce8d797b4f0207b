//! Cross-site request forgery tokens.
//!
//! The token rides in a cookie the sign-in form can read and must be echoed
//! back in the matching form field on any state-mutating request.

use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use constant_time_eq::constant_time_eq;
use rand::{rngs::OsRng, RngCore};

use super::constants::CSRF_TOKEN_COOKIE;
use super::cookie;
use super::error::Error;

/// Generate a fresh random token.
///
/// # Errors
///
/// Returns an error if the OS random source fails.
pub fn generate_token() -> Result<String, Error> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::TokenGeneration)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Compare the submitted form token against the token cookie.
///
/// Rejects when either side is missing or empty; the comparison itself is
/// constant time.
#[must_use]
pub fn validate_form(headers: &HeaderMap, submitted: &str) -> bool {
    if submitted.is_empty() {
        return false;
    }
    let Some(expected) = cookie::cookie_value(headers, CSRF_TOKEN_COOKIE) else {
        return false;
    };
    constant_time_eq(expected.as_bytes(), submitted.as_bytes())
}
